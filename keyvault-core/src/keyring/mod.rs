//! Keyrings
//!
//! A keyring owns credential access and account derivation for one wallet.
//! The variant follows the wallet type:
//!
//! - [`HdKeyring`]: accounts derived from the wallet's seed
//! - [`ImportedKeyring`]: one private key per account
//! - [`WatchingKeyring`]: address only, cannot sign
//! - [`HardwareKeyring`]: keys stay on an external device
//!
//! Decrypted material never outlives a single call. Signing for one account
//! is serialised by [`SigningLocks`] from decryption until the signer is
//! dropped.

mod hardware;
mod hd;
mod imported;
mod watching;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::account::{Account, AccountStore, WalletType};
use crate::chains::ChainPlugin;
use crate::credential::CredentialStore;
use crate::crypto::cipher::Password;
use crate::error::{Error, Result};
use crate::signer::Signer;
use crate::transaction::{SignedTx, UnsignedTx};

pub use hardware::{HardwareDevice, HardwareKeyring, HardwareSigner};
pub use hd::HdKeyring;
pub use imported::{imported_credential_id, ImportedKeyring};
pub use watching::WatchingKeyring;

/// Input to [`Keyring::prepare_accounts`], one shape per wallet type
#[derive(Debug, Clone)]
pub enum PrepareAccountsParams {
    Hd {
        password: Password,
        indexes: Vec<u32>,
        /// Optional names, matched to `indexes` by position
        names: Vec<String>,
    },
    Imported {
        password: Password,
        /// Id the private key was saved under
        credential_id: String,
        name: String,
    },
    Watching {
        target: String,
        name: String,
        account_id_prefix: String,
    },
    Hardware {
        indexes: Vec<u32>,
        names: Vec<String>,
    },
}

impl PrepareAccountsParams {
    fn kind(&self) -> &'static str {
        match self {
            PrepareAccountsParams::Hd { .. } => "hd",
            PrepareAccountsParams::Imported { .. } => "imported",
            PrepareAccountsParams::Watching { .. } => "watching",
            PrepareAccountsParams::Hardware { .. } => "hw",
        }
    }
}

/// Explicit signing context: which account, unlocked with which password
#[derive(Debug, Clone)]
pub struct SignCredentialOptions {
    pub account_id: String,
    pub password: Password,
}

impl SignCredentialOptions {
    pub fn new(account_id: impl Into<String>, password: Password) -> Self {
        Self {
            account_id: account_id.into(),
            password,
        }
    }
}

/// Account preparation and signing for one wallet on one chain
#[async_trait]
pub trait Keyring: Send + Sync {
    fn wallet_id(&self) -> &str;

    fn wallet_type(&self) -> WalletType;

    /// Derive or describe new accounts. Nothing is persisted here; the
    /// caller stores the returned accounts.
    async fn prepare_accounts(&self, params: &PrepareAccountsParams) -> Result<Vec<Account>>;

    /// Signers for exactly the given addresses, all of which must belong to
    /// this keyring
    async fn get_signers(&self, password: &Password, addresses: &[String]) -> Result<HashMap<String, Signer>>;

    async fn sign_transaction(&self, unsigned: &UnsignedTx, options: &SignCredentialOptions) -> Result<SignedTx>;

    async fn sign_message(&self, messages: &[String], options: &SignCredentialOptions) -> Result<Vec<String>>;
}

/// Per-account async locks serialising signing
#[derive(Clone, Default)]
pub struct SigningLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl SigningLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive signing access to `account_id`
    pub async fn acquire(&self, account_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(account_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drop the lock for `account_id` unless a signer still holds or awaits it
    pub fn evict(&self, account_id: &str) {
        if self.locks.remove_if(account_id, |_, lock| Arc::strong_count(lock) == 1).is_some() {
            debug!(account_id = %account_id, "signing lock evicted");
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Collaborators shared by every keyring variant
#[derive(Clone)]
pub struct KeyringContext {
    pub wallet_id: String,
    pub plugin: Arc<dyn ChainPlugin>,
    pub credentials: Arc<dyn CredentialStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub locks: SigningLocks,
}

impl KeyringContext {
    /// Load an account and check it belongs to this wallet and chain
    pub(crate) async fn owned_account(&self, account_id: &str) -> Result<Account> {
        let account = self
            .accounts
            .get_account(account_id)
            .await?
            .ok_or_else(|| Error::InvalidInput(format!("Unknown account: {}", account_id)))?;

        if account.wallet_id() != self.wallet_id || account.coin_type != self.plugin.coin_type() {
            return Err(Error::InvalidInput(format!(
                "Account {} does not belong to wallet {} on {}",
                account_id,
                self.wallet_id,
                self.plugin.chain_impl()
            )));
        }
        Ok(account)
    }

    /// Map each requested address to the owned account holding it.
    ///
    /// Addresses are compared in the chain's normalised form. Rejects empty
    /// input, malformed addresses, duplicates and any address the wallet does
    /// not own on this chain.
    pub(crate) async fn accounts_for_addresses(&self, addresses: &[String]) -> Result<Vec<Account>> {
        if addresses.is_empty() {
            return Err(Error::InvalidInput("No addresses given for signing".to_string()));
        }
        let normalized = addresses
            .iter()
            .map(|address| self.plugin.validate_address(address))
            .collect::<Result<Vec<String>>>()?;
        let mut seen = HashSet::new();
        if !normalized.iter().all(|address| seen.insert(address.as_str())) {
            return Err(Error::InvalidInput("Duplicate addresses given for signing".to_string()));
        }

        let coin_type = self.plugin.coin_type();
        let owned: HashMap<String, Account> = self
            .accounts
            .get_wallet_accounts(&self.wallet_id)
            .await?
            .into_iter()
            .filter(|account| account.coin_type == coin_type)
            .map(|account| {
                let key = self
                    .plugin
                    .validate_address(&account.address)
                    .unwrap_or_else(|_| account.address.clone());
                (key, account)
            })
            .collect();

        normalized
            .iter()
            .map(|address| {
                owned
                    .get(address)
                    .cloned()
                    .ok_or_else(|| Error::InvalidInput(format!("Address not owned by wallet {}: {}", self.wallet_id, address)))
            })
            .collect()
    }

    /// Check a derived signer still produces the stored address
    pub(crate) fn check_signer(&self, account: &Account, signer: &Signer) -> Result<()> {
        let address = self.plugin.address_from_public_key(&signer.public_key()?)?;
        if address != account.address {
            return Err(Error::Derivation(format!(
                "Key for account {} does not match its address",
                account.id
            )));
        }
        Ok(())
    }

    /// Shared signing path for keyrings holding software keys: resolve the
    /// account, take its lock, obtain exactly one signer, sign, and drop the
    /// signer before releasing the lock.
    pub(crate) async fn sign_transaction_with<K>(
        &self,
        keyring: &K,
        unsigned: &UnsignedTx,
        options: &SignCredentialOptions,
    ) -> Result<SignedTx>
    where
        K: Keyring + ?Sized,
    {
        let account = self.owned_account(&options.account_id).await?;
        if self.plugin.validate_address(&unsigned.from)? != account.address {
            return Err(Error::InvalidInput(format!(
                "Transaction sender {} is not account {}",
                unsigned.from, account.id
            )));
        }

        let _guard = self.locks.acquire(&account.id).await;
        let signer = self.single_signer(keyring, &account, &options.password).await?;
        debug!(account_id = %account.id, "signing transaction");
        self.plugin.sign_transaction(unsigned, &signer).await
    }

    pub(crate) async fn sign_messages_with<K>(
        &self,
        keyring: &K,
        messages: &[String],
        options: &SignCredentialOptions,
    ) -> Result<Vec<String>>
    where
        K: Keyring + ?Sized,
    {
        let account = self.owned_account(&options.account_id).await?;
        let _guard = self.locks.acquire(&account.id).await;
        let signer = self.single_signer(keyring, &account, &options.password).await?;

        let mut signatures = Vec::with_capacity(messages.len());
        for message in messages {
            signatures.push(self.plugin.sign_message(message, &signer).await?);
        }
        Ok(signatures)
    }

    async fn single_signer<K>(&self, keyring: &K, account: &Account, password: &Password) -> Result<Signer>
    where
        K: Keyring + ?Sized,
    {
        let mut signers = keyring
            .get_signers(password, std::slice::from_ref(&account.address))
            .await?;
        signers
            .remove(&account.address)
            .ok_or_else(|| Error::Signing(format!("Unable to get signer for {}", account.id)))
    }
}

/// Reject params meant for another keyring variant
fn wrong_params(expected: WalletType, params: &PrepareAccountsParams) -> Error {
    Error::InvalidInput(format!(
        "{} keyring cannot prepare {} accounts",
        expected,
        params.kind()
    ))
}

/// Default `<PREFIX> #<index+1>` unless a non-empty name was supplied
fn account_name(plugin: &dyn ChainPlugin, names: &[String], position: usize, index: u32) -> String {
    match names.get(position) {
        Some(name) if !name.is_empty() => name.clone(),
        _ => format!("{} #{}", plugin.account_name_prefix(), index as u64 + 1),
    }
}

fn check_indexes(indexes: &[u32]) -> Result<()> {
    let mut seen = HashSet::new();
    if !indexes.iter().all(|index| seen.insert(*index)) {
        return Err(Error::InvalidInput("Duplicate account indexes".to_string()));
    }
    Ok(())
}
