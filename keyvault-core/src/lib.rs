//! Keyvault Core - multi-chain account vault
//!
//! This library manages accounts across EVM, Solana and Algorand: encrypted
//! credential storage, HD / imported / watching / hardware keyrings, chain
//! specific transaction building and signing, and the authorization gate
//! that sits between dApps and the vaults.

pub mod error;
pub mod crypto;
pub mod credential;
pub mod account;
pub mod chains;
pub mod network;
pub mod transaction;
pub mod signer;
pub mod keyring;
pub mod vault;
pub mod dapp;

// Re-export commonly used types for convenience
pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
