//! Hardware keyring
//!
//! Keys never leave the device. The keyring asks the device for public keys
//! when preparing accounts and forwards signing payloads to it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::account::{hd_account_id, Account, AccountType, WalletType};
use crate::crypto::cipher::Password;
use crate::crypto::keys::{Curve, PublicKey, RawSignature};
use crate::error::{Error, Result};
use crate::signer::{Signer, TxSigner};
use crate::transaction::{SignedTx, UnsignedTx};
use super::{account_name, check_indexes, wrong_params, Keyring, KeyringContext, PrepareAccountsParams, SignCredentialOptions};

/// An external signing device
#[async_trait]
pub trait HardwareDevice: Send + Sync {
    /// Public keys at the given absolute paths, in order
    async fn get_public_keys(&self, curve: Curve, paths: &[String]) -> Result<Vec<PublicKey>>;

    /// Sign with the key at `path`. Same payload rules as [`TxSigner`].
    async fn sign(&self, curve: Curve, path: &str, payload: &[u8]) -> Result<RawSignature>;
}

/// Signer handle for one device path
pub struct HardwareSigner {
    device: Arc<dyn HardwareDevice>,
    path: String,
    curve: Curve,
}

impl HardwareSigner {
    pub fn new(device: Arc<dyn HardwareDevice>, path: impl Into<String>, curve: Curve) -> Self {
        Self {
            device,
            path: path.into(),
            curve,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl TxSigner for HardwareSigner {
    fn curve(&self) -> Curve {
        self.curve
    }

    async fn sign(&self, payload: &[u8]) -> Result<RawSignature> {
        self.device.sign(self.curve, &self.path, payload).await
    }
}

pub struct HardwareKeyring {
    ctx: KeyringContext,
    device: Arc<dyn HardwareDevice>,
}

impl HardwareKeyring {
    pub fn new(ctx: KeyringContext, device: Arc<dyn HardwareDevice>) -> Self {
        Self { ctx, device }
    }

    fn signer_for(&self, account: &Account) -> HardwareSigner {
        HardwareSigner::new(self.device.clone(), account.path.clone(), self.ctx.plugin.curve())
    }
}

#[async_trait]
impl Keyring for HardwareKeyring {
    fn wallet_id(&self) -> &str {
        &self.ctx.wallet_id
    }

    fn wallet_type(&self) -> WalletType {
        WalletType::Hardware
    }

    #[instrument(skip(self, params), fields(wallet_id = %self.ctx.wallet_id))]
    async fn prepare_accounts(&self, params: &PrepareAccountsParams) -> Result<Vec<Account>> {
        let (indexes, names) = match params {
            PrepareAccountsParams::Hardware { indexes, names } => (indexes, names),
            other => return Err(wrong_params(WalletType::Hardware, other)),
        };
        check_indexes(indexes)?;

        let plugin = &self.ctx.plugin;
        let paths: Vec<String> = indexes.iter().map(|i| plugin.account_path(*i)).collect();
        let public_keys = self.device.get_public_keys(plugin.curve(), &paths).await?;
        if public_keys.len() != indexes.len() {
            return Err(Error::Derivation(format!(
                "Device returned {} public keys for {} paths",
                public_keys.len(),
                indexes.len()
            )));
        }

        paths
            .into_iter()
            .zip(public_keys)
            .zip(indexes.iter())
            .enumerate()
            .map(|(position, ((path, public_key), index))| -> Result<Account> {
                Ok(Account {
                    id: hd_account_id(&self.ctx.wallet_id, &path),
                    name: account_name(plugin.as_ref(), names, position, *index),
                    account_type: AccountType::Simple,
                    address: plugin.address_from_public_key(&public_key)?,
                    pub_key: public_key.to_hex(),
                    coin_type: plugin.coin_type(),
                    path,
                })
            })
            .collect()
    }

    async fn get_signers(&self, _password: &Password, _addresses: &[String]) -> Result<HashMap<String, Signer>> {
        Err(Error::NotSupported("Hardware keys cannot be exported as signers".to_string()))
    }

    #[instrument(skip(self, unsigned, options), fields(account_id = %options.account_id))]
    async fn sign_transaction(&self, unsigned: &UnsignedTx, options: &SignCredentialOptions) -> Result<SignedTx> {
        let account = self.ctx.owned_account(&options.account_id).await?;
        if self.ctx.plugin.validate_address(&unsigned.from)? != account.address {
            return Err(Error::InvalidInput(format!(
                "Transaction sender {} is not account {}",
                unsigned.from, account.id
            )));
        }

        let _guard = self.ctx.locks.acquire(&account.id).await;
        debug!(path = %account.path, "forwarding transaction to device");
        self.ctx
            .plugin
            .sign_transaction(unsigned, &self.signer_for(&account))
            .await
    }

    #[instrument(skip(self, messages, options), fields(account_id = %options.account_id))]
    async fn sign_message(&self, messages: &[String], options: &SignCredentialOptions) -> Result<Vec<String>> {
        let account = self.ctx.owned_account(&options.account_id).await?;

        let _guard = self.ctx.locks.acquire(&account.id).await;
        let signer = self.signer_for(&account);
        let mut signatures = Vec::with_capacity(messages.len());
        for message in messages {
            signatures.push(self.ctx.plugin.sign_message(message, &signer).await?);
        }
        Ok(signatures)
    }
}
