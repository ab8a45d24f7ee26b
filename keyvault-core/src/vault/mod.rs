//! Vaults
//!
//! A [`Vault`] binds one network's chain plugin to one wallet's keyring. It
//! is the only component turning an [`UnsignedTx`] into a [`SignedTx`].

mod factory;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument};

use crate::account::Account;
use crate::chains::{ChainPlugin, VaultSettings};
use crate::error::{Error, Result};
use crate::keyring::{Keyring, PrepareAccountsParams, SignCredentialOptions};
use crate::network::Network;
use crate::transaction::{ChainClient, FeeInfo, SignedTx, TransferInfo, TxContext, UnsignedTx};

pub use factory::{VaultFactory, DEFAULT_SIGN_TIMEOUT};

/// Chain façade for one wallet on one network
pub struct Vault {
    network: Network,
    plugin: Arc<dyn ChainPlugin>,
    keyring: Arc<dyn Keyring>,
    client: Arc<dyn ChainClient>,
    sign_timeout: Duration,
}

impl Vault {
    pub fn new(
        network: Network,
        plugin: Arc<dyn ChainPlugin>,
        keyring: Arc<dyn Keyring>,
        client: Arc<dyn ChainClient>,
        sign_timeout: Duration,
    ) -> Self {
        Self {
            network,
            plugin,
            keyring,
            client,
            sign_timeout,
        }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn wallet_id(&self) -> &str {
        self.keyring.wallet_id()
    }

    pub fn keyring(&self) -> &dyn Keyring {
        self.keyring.as_ref()
    }

    pub fn settings(&self) -> VaultSettings {
        self.plugin.settings()
    }

    /// Normalised address, or `InvalidAddress`
    pub fn validate_address(&self, address: &str) -> Result<String> {
        self.plugin.validate_address(address)
    }

    pub async fn prepare_accounts(&self, params: &PrepareAccountsParams) -> Result<Vec<Account>> {
        self.keyring.prepare_accounts(params).await
    }

    /// Ask the chain client for the state a transfer from `from` binds to
    pub async fn fetch_tx_context(&self, from: &str) -> Result<TxContext> {
        let from = self.validate_address(from)?;
        let context = self.client.tx_context(&self.network, &from).await?;
        self.plugin.check_context(&context)?;
        Ok(context)
    }

    /// Validate a transfer and bind it to fee parameters and chain context.
    ///
    /// Fees fall back to the network defaults when none are given or when the
    /// chain does not allow editing them.
    pub fn build_unsigned_tx(&self, transfer: &TransferInfo, fee: Option<FeeInfo>, context: TxContext) -> Result<UnsignedTx> {
        let settings = self.settings();
        let from = self.validate_address(&transfer.from)?;
        let to = self.validate_address(&transfer.to)?;

        if settings.cannot_send_to_self && from == to {
            return Err(Error::InvalidInput("Cannot send to self".to_string()));
        }

        let memo = transfer.memo.clone().filter(|memo| !memo.is_empty());
        if memo.is_some() && !settings.memo_supported {
            return Err(Error::InvalidInput(format!("{} does not support memos", self.network.name)));
        }

        if transfer.amount > self.plugin.max_amount() {
            return Err(Error::InvalidInput(format!("Amount out of range: {}", transfer.amount)));
        }

        self.plugin.check_context(&context)?;

        let defaults = FeeInfo {
            limit: self.network.fee.default_limit,
            price: self.network.fee.default_price,
        };
        let fee = match fee {
            Some(fee) if settings.fee_info_editable => fee,
            Some(_) => {
                debug!(network = %self.network.id, "fee not editable, using defaults");
                defaults
            }
            None => defaults,
        };

        Ok(UnsignedTx {
            from,
            to,
            value: transfer.amount,
            fee,
            memo,
            context,
        })
    }

    /// Fetch a context and build the transfer in one step
    pub async fn prepare_transfer(&self, transfer: &TransferInfo, fee: Option<FeeInfo>) -> Result<UnsignedTx> {
        let context = self.fetch_tx_context(&transfer.from).await?;
        self.build_unsigned_tx(transfer, fee, context)
    }

    /// Sign within the configured timeout. Decrypted keys are gone once this
    /// returns, whatever the outcome.
    #[instrument(skip(self, unsigned, options), fields(network = %self.network.id, account_id = %options.account_id))]
    pub async fn sign_transaction(&self, unsigned: &UnsignedTx, options: &SignCredentialOptions) -> Result<SignedTx> {
        self.plugin.check_context(&unsigned.context)?;
        let signed = tokio::time::timeout(self.sign_timeout, self.keyring.sign_transaction(unsigned, options))
            .await
            .map_err(|_| Error::Timeout(format!("signing exceeded {:?}", self.sign_timeout)))??;

        info!(txid = %signed.txid, "transaction signed");
        Ok(signed)
    }

    #[instrument(skip(self, messages, options), fields(network = %self.network.id, account_id = %options.account_id))]
    pub async fn sign_message(&self, messages: &[String], options: &SignCredentialOptions) -> Result<Vec<String>> {
        tokio::time::timeout(self.sign_timeout, self.keyring.sign_message(messages, options))
            .await
            .map_err(|_| Error::Timeout(format!("message signing exceeded {:?}", self.sign_timeout)))?
    }

    /// Hand signed bytes to the chain client
    #[instrument(skip(self, signed), fields(network = %self.network.id, txid = %signed.txid))]
    pub async fn broadcast_transaction(&self, signed: &SignedTx) -> Result<String> {
        let txid = self.client.send(&self.network, signed).await?;
        info!(%txid, "transaction broadcast");
        Ok(txid)
    }

    /// Sign, release the key, then broadcast
    pub async fn sign_and_send(&self, unsigned: &UnsignedTx, options: &SignCredentialOptions) -> Result<String> {
        let signed = self.sign_transaction(unsigned, options).await?;
        self.broadcast_transaction(&signed).await
    }
}
