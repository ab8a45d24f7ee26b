//! Keyvault Bridge
//!
//! Glue between dApp provider requests and keyvault-core: request routing,
//! wallet management, configuration and logging setup.

pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod router;

use std::sync::Arc;

use keyvault_core::credential::InMemoryCredentialStore;
use keyvault_core::crypto::cipher::CredentialCipher;
use keyvault_core::dapp::{AccountsChangedNotifier, ApprovalUi, DappGate};
use keyvault_core::account::InMemoryAccountStore;
use keyvault_core::network::StaticNetworkProvider;
use keyvault_core::transaction::ChainClient;
use keyvault_core::vault::VaultFactory;

pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult, RpcError};
pub use manager::WalletManager;
pub use router::{DappRouter, Session};

/// Wire an in-memory wallet manager from configuration
pub fn in_memory_manager(
    config: &BridgeConfig,
    ui: Arc<dyn ApprovalUi>,
    client: Arc<dyn ChainClient>,
) -> BridgeResult<WalletManager> {
    let factory = VaultFactory::new(
        Arc::new(StaticNetworkProvider::default()),
        Arc::new(InMemoryAccountStore::new()),
        Arc::new(InMemoryCredentialStore::new(CredentialCipher::new(config.kdf_iterations))),
        client,
    )
    .with_sign_timeout(config.sign_timeout);

    let gate = DappGate::new(
        config.load_policy()?,
        ui,
        AccountsChangedNotifier::new(config.notify_delay),
    );

    Ok(WalletManager::new(Arc::new(factory), Arc::new(gate)))
}
