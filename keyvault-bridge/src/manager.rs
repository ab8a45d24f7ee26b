//! Wallet management on top of the vault factory

use std::sync::Arc;

use keyvault_core::account::{Account, Wallet, WalletType, IMPORTED_WALLET_ID, WATCHING_WALLET_ID};
use keyvault_core::chains::{plugin_for, plugin_for_coin_type};
use keyvault_core::credential::Credential;
use keyvault_core::crypto::cipher::Password;
use keyvault_core::crypto::keys::PrivateKey;
use keyvault_core::crypto::mnemonic::{mnemonic_to_seed, validate_mnemonic};
use keyvault_core::dapp::DappGate;
use keyvault_core::keyring::{imported_credential_id, PrepareAccountsParams};
use keyvault_core::network::parse_network_impl;
use keyvault_core::vault::VaultFactory;
use keyvault_core::Error as CoreError;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::error::{BridgeError, BridgeResult};

/// Creates wallets, adds and removes accounts, and keeps dApp connections
/// and credentials in step with the account list
pub struct WalletManager {
    factory: Arc<VaultFactory>,
    gate: Arc<DappGate>,
}

impl WalletManager {
    pub fn new(factory: Arc<VaultFactory>, gate: Arc<DappGate>) -> Self {
        Self { factory, gate }
    }

    pub fn factory(&self) -> &Arc<VaultFactory> {
        &self.factory
    }

    pub fn gate(&self) -> &Arc<DappGate> {
        &self.gate
    }

    /// Create an HD wallet from a mnemonic. The seed is stored encrypted
    /// under the new wallet id.
    #[instrument(skip(self, mnemonic, password))]
    pub async fn create_hd_wallet(&self, name: &str, mnemonic: &str, password: &Password) -> BridgeResult<Wallet> {
        if password.is_empty() {
            return Err(BridgeError::InvalidParams("Password must not be empty".to_string()));
        }
        validate_mnemonic(mnemonic)?;
        let seed = mnemonic_to_seed(mnemonic, None)?;

        let wallet = Wallet::new(format!("hd-{}", Uuid::new_v4()), name, WalletType::Hd);
        self.factory
            .credentials()
            .save_credential(&wallet.id, &Credential::Seed(seed.to_vec()), password)
            .await?;
        self.factory.accounts().create_wallet(wallet.clone()).await?;

        info!(wallet_id = %wallet.id, "hd wallet created");
        Ok(wallet)
    }

    /// Derive and store HD accounts at `indexes` on a network
    pub async fn add_hd_accounts(
        &self,
        network_id: &str,
        wallet_id: &str,
        password: &Password,
        indexes: Vec<u32>,
    ) -> BridgeResult<Vec<Account>> {
        let vault = self.factory.create_vault(network_id, wallet_id).await?;
        let accounts = vault
            .prepare_accounts(&PrepareAccountsParams::Hd {
                password: password.clone(),
                indexes,
                names: Vec::new(),
            })
            .await?;
        self.factory.accounts().add_accounts(wallet_id, accounts.clone()).await?;
        Ok(accounts)
    }

    /// Import a hex private key as an account of the network's chain
    #[instrument(skip(self, private_key_hex, password))]
    pub async fn import_private_key(
        &self,
        network_id: &str,
        private_key_hex: &str,
        name: &str,
        password: &Password,
    ) -> BridgeResult<Account> {
        let plugin = plugin_for(parse_network_impl(network_id)?);
        let bytes = Zeroizing::new(
            hex::decode(private_key_hex.trim_start_matches("0x"))
                .map_err(|_| BridgeError::InvalidParams("Private key must be hex".to_string()))?,
        );
        let private_key = PrivateKey::from_slice(&bytes, plugin.curve())?;
        let credential_id = imported_credential_id(plugin.as_ref(), &private_key)?;

        self.factory
            .credentials()
            .save_credential(&credential_id, &Credential::PrivateKey(bytes.to_vec()), password)
            .await?;

        let vault = self.factory.create_vault(network_id, IMPORTED_WALLET_ID).await?;
        let mut accounts = vault
            .prepare_accounts(&PrepareAccountsParams::Imported {
                password: password.clone(),
                credential_id,
                name: name.to_string(),
            })
            .await?;
        self.factory
            .accounts()
            .add_accounts(IMPORTED_WALLET_ID, accounts.clone())
            .await?;

        accounts
            .pop()
            .ok_or_else(|| CoreError::Derivation("Import produced no account".to_string()).into())
    }

    pub async fn add_watching_account(&self, network_id: &str, address: &str, name: &str) -> BridgeResult<Account> {
        let vault = self.factory.create_vault(network_id, WATCHING_WALLET_ID).await?;
        let mut accounts = vault
            .prepare_accounts(&PrepareAccountsParams::Watching {
                target: address.to_string(),
                name: name.to_string(),
                account_id_prefix: WATCHING_WALLET_ID.to_string(),
            })
            .await?;
        self.factory
            .accounts()
            .add_accounts(WATCHING_WALLET_ID, accounts.clone())
            .await?;

        accounts
            .pop()
            .ok_or_else(|| CoreError::InvalidAddress(address.to_string()).into())
    }

    /// Remove an account together with its dApp connections and, for
    /// imported accounts, its credential
    #[instrument(skip(self))]
    pub async fn remove_account(&self, account_id: &str) -> BridgeResult<Option<Account>> {
        let Some(account) = self.factory.accounts().remove_account(account_id).await? else {
            return Ok(None);
        };

        if let Some(plugin) = plugin_for_coin_type(account.coin_type) {
            self.gate.remove_address(plugin.chain_impl(), &account.address).await;
        }
        if account.wallet_id() == IMPORTED_WALLET_ID {
            let removed = self.factory.credentials().remove_credential(&account.id).await?;
            if !removed {
                warn!(account_id, "imported account had no credential");
            }
        }
        self.factory.release_account(&account.id);

        info!(account_id, "account removed");
        Ok(Some(account))
    }

    pub async fn rename_account(&self, account_id: &str, name: &str) -> BridgeResult<Account> {
        if name.trim().is_empty() {
            return Err(BridgeError::InvalidParams("Account name must not be empty".to_string()));
        }
        Ok(self.factory.accounts().set_account_name(account_id, name).await?)
    }
}
