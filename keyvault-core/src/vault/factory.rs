//! Vault construction

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;

use crate::account::{AccountStore, WalletType};
use crate::chains::{plugin_for, VaultSettings};
use crate::credential::CredentialStore;
use crate::error::{Error, Result};
use crate::keyring::{
    HardwareDevice, HardwareKeyring, HdKeyring, ImportedKeyring, Keyring, KeyringContext, SigningLocks,
    WatchingKeyring,
};
use crate::network::NetworkProvider;
use crate::transaction::ChainClient;
use super::Vault;

pub const DEFAULT_SIGN_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds vaults from a network id and a wallet id.
///
/// All vaults from one factory share the same signing locks, so signing for
/// an account is serialised no matter which vault instance is used.
pub struct VaultFactory {
    networks: Arc<dyn NetworkProvider>,
    accounts: Arc<dyn AccountStore>,
    credentials: Arc<dyn CredentialStore>,
    client: Arc<dyn ChainClient>,
    devices: DashMap<String, Arc<dyn HardwareDevice>>,
    locks: SigningLocks,
    sign_timeout: Duration,
}

impl VaultFactory {
    pub fn new(
        networks: Arc<dyn NetworkProvider>,
        accounts: Arc<dyn AccountStore>,
        credentials: Arc<dyn CredentialStore>,
        client: Arc<dyn ChainClient>,
    ) -> Self {
        Self {
            networks,
            accounts,
            credentials,
            client,
            devices: DashMap::new(),
            locks: SigningLocks::new(),
            sign_timeout: DEFAULT_SIGN_TIMEOUT,
        }
    }

    pub fn with_sign_timeout(mut self, sign_timeout: Duration) -> Self {
        self.sign_timeout = sign_timeout;
        self
    }

    /// Attach the device backing a hardware wallet
    pub fn register_device(&self, wallet_id: &str, device: Arc<dyn HardwareDevice>) {
        self.devices.insert(wallet_id.to_string(), device);
    }

    pub fn accounts(&self) -> &Arc<dyn AccountStore> {
        &self.accounts
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    pub fn networks(&self) -> &Arc<dyn NetworkProvider> {
        &self.networks
    }

    pub fn signing_locks(&self) -> &SigningLocks {
        &self.locks
    }

    /// Forget per-account state once an account is removed
    pub fn release_account(&self, account_id: &str) {
        self.locks.evict(account_id);
    }

    pub async fn create_vault(&self, network_id: &str, wallet_id: &str) -> Result<Vault> {
        let network = self.networks.get_network(network_id).await?;
        let wallet = self
            .accounts
            .get_wallet(wallet_id)
            .await?
            .ok_or_else(|| Error::InvalidInput(format!("Unknown wallet: {}", wallet_id)))?;

        let plugin = plugin_for(network.network_impl);
        ensure_wallet_type_enabled(&plugin.settings(), wallet.wallet_type, network_id)?;

        let ctx = KeyringContext {
            wallet_id: wallet.id.clone(),
            plugin: plugin.clone(),
            credentials: self.credentials.clone(),
            accounts: self.accounts.clone(),
            locks: self.locks.clone(),
        };
        let keyring: Arc<dyn Keyring> = match wallet.wallet_type {
            WalletType::Hd => Arc::new(HdKeyring::new(ctx)),
            WalletType::Imported => Arc::new(ImportedKeyring::new(ctx)),
            WalletType::Watching => Arc::new(WatchingKeyring::new(ctx)),
            WalletType::Hardware => {
                let device = self
                    .devices
                    .get(wallet_id)
                    .map(|device| device.value().clone())
                    .ok_or_else(|| Error::NotSupported(format!("No device connected for wallet {}", wallet_id)))?;
                Arc::new(HardwareKeyring::new(ctx, device))
            }
        };

        debug!(network_id, wallet_id, wallet_type = %wallet.wallet_type, "vault created");
        Ok(Vault::new(network, plugin, keyring, self.client.clone(), self.sign_timeout))
    }

    /// Vault for the wallet owning `account_id`
    pub async fn create_vault_for_account(&self, network_id: &str, account_id: &str) -> Result<Vault> {
        let account = self
            .accounts
            .get_account(account_id)
            .await?
            .ok_or_else(|| Error::InvalidInput(format!("Unknown account: {}", account_id)))?;
        self.create_vault(network_id, account.wallet_id()).await
    }
}

fn ensure_wallet_type_enabled(settings: &VaultSettings, wallet_type: WalletType, network_id: &str) -> Result<()> {
    let enabled = match wallet_type {
        WalletType::Hd => true,
        WalletType::Imported => settings.imported_account_enabled,
        WalletType::Watching => settings.watching_account_enabled,
        WalletType::Hardware => settings.hardware_account_enabled,
    };
    if !enabled {
        return Err(Error::NotSupported(format!(
            "{} accounts are not available on {}",
            wallet_type, network_id
        )));
    }
    Ok(())
}
