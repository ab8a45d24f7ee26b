//! Account persistence
//!
//! The core does not own a database. Accounts and wallets are handed to an
//! [`AccountStore`] keyed by string ids; the in-memory implementation here
//! backs tests and the bridge.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use super::{Account, Wallet, WalletType, IMPORTED_WALLET_ID, WATCHING_WALLET_ID};

/// Storage for wallets and their accounts
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Register a new wallet; fails if the id is taken
    async fn create_wallet(&self, wallet: Wallet) -> Result<()>;

    async fn get_wallet(&self, wallet_id: &str) -> Result<Option<Wallet>>;

    async fn get_account(&self, account_id: &str) -> Result<Option<Account>>;

    /// All accounts of a wallet in insertion order
    async fn get_wallet_accounts(&self, wallet_id: &str) -> Result<Vec<Account>>;

    /// Attach accounts to a wallet. Accounts whose id already exists are
    /// skipped; the newly added ones are returned.
    async fn add_accounts(&self, wallet_id: &str, accounts: Vec<Account>) -> Result<Vec<Account>>;

    /// The only mutable account field
    async fn set_account_name(&self, account_id: &str, name: &str) -> Result<Account>;

    /// Remove an account from its wallet, returning it if it existed
    async fn remove_account(&self, account_id: &str) -> Result<Option<Account>>;
}

#[derive(Default)]
struct Inner {
    wallets: HashMap<String, Wallet>,
    accounts: HashMap<String, Account>,
}

/// Account store backed by maps behind a single lock, so a wallet and its
/// accounts are always updated together
pub struct InMemoryAccountStore {
    inner: RwLock<Inner>,
}

impl Default for InMemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAccountStore {
    /// Create a store with the shared imported and watching wallets in place
    pub fn new() -> Self {
        let mut inner = Inner::default();
        for (id, wallet_type) in [
            (IMPORTED_WALLET_ID, WalletType::Imported),
            (WATCHING_WALLET_ID, WalletType::Watching),
        ] {
            inner.wallets.insert(id.to_string(), Wallet::new(id, id, wallet_type));
        }

        Self {
            inner: RwLock::new(inner),
        }
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn create_wallet(&self, wallet: Wallet) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.wallets.contains_key(&wallet.id) {
            return Err(Error::InvalidInput(format!("Wallet already exists: {}", wallet.id)));
        }
        inner.wallets.insert(wallet.id.clone(), wallet);
        Ok(())
    }

    async fn get_wallet(&self, wallet_id: &str) -> Result<Option<Wallet>> {
        Ok(self.inner.read().await.wallets.get(wallet_id).cloned())
    }

    async fn get_account(&self, account_id: &str) -> Result<Option<Account>> {
        Ok(self.inner.read().await.accounts.get(account_id).cloned())
    }

    async fn get_wallet_accounts(&self, wallet_id: &str) -> Result<Vec<Account>> {
        let inner = self.inner.read().await;
        let wallet = inner
            .wallets
            .get(wallet_id)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown wallet: {}", wallet_id)))?;

        Ok(wallet
            .accounts
            .iter()
            .filter_map(|id| inner.accounts.get(id).cloned())
            .collect())
    }

    async fn add_accounts(&self, wallet_id: &str, accounts: Vec<Account>) -> Result<Vec<Account>> {
        let mut inner = self.inner.write().await;
        if !inner.wallets.contains_key(wallet_id) {
            return Err(Error::InvalidInput(format!("Unknown wallet: {}", wallet_id)));
        }

        let mut added = Vec::new();
        for account in accounts {
            if inner.accounts.contains_key(&account.id) {
                continue;
            }
            inner.accounts.insert(account.id.clone(), account.clone());
            added.push(account);
        }

        if let Some(wallet) = inner.wallets.get_mut(wallet_id) {
            wallet.accounts.extend(added.iter().map(|a| a.id.clone()));
        }
        Ok(added)
    }

    async fn set_account_name(&self, account_id: &str, name: &str) -> Result<Account> {
        let mut inner = self.inner.write().await;
        let account = inner
            .accounts
            .get_mut(account_id)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown account: {}", account_id)))?;
        account.name = name.to_string();
        Ok(account.clone())
    }

    async fn remove_account(&self, account_id: &str) -> Result<Option<Account>> {
        let mut inner = self.inner.write().await;
        let removed = inner.accounts.remove(account_id);
        if removed.is_some() {
            for wallet in inner.wallets.values_mut() {
                wallet.accounts.retain(|id| id != account_id);
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{hd_account_id, AccountType};

    fn account(wallet_id: &str, index: u32) -> Account {
        let path = format!("m/44'/60'/0'/0/{}", index);
        Account {
            id: hd_account_id(wallet_id, &path),
            name: format!("EVM #{}", index + 1),
            account_type: AccountType::Simple,
            path,
            coin_type: 60,
            pub_key: String::new(),
            address: format!("0x{:040x}", index),
        }
    }

    #[tokio::test]
    async fn test_add_accounts_skips_duplicates() {
        let store = InMemoryAccountStore::new();
        store.create_wallet(Wallet::new("hd-1", "Main", WalletType::Hd)).await.unwrap();

        let added = store.add_accounts("hd-1", vec![account("hd-1", 0), account("hd-1", 1)]).await.unwrap();
        assert_eq!(added.len(), 2);

        let added = store.add_accounts("hd-1", vec![account("hd-1", 1), account("hd-1", 2)]).await.unwrap();
        assert_eq!(added.len(), 1);
        assert_eq!(store.get_wallet_accounts("hd-1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_rename_and_remove() {
        let store = InMemoryAccountStore::new();
        store.create_wallet(Wallet::new("hd-1", "Main", WalletType::Hd)).await.unwrap();
        store.add_accounts("hd-1", vec![account("hd-1", 0)]).await.unwrap();

        let id = hd_account_id("hd-1", "m/44'/60'/0'/0/0");
        let renamed = store.set_account_name(&id, "Savings").await.unwrap();
        assert_eq!(renamed.name, "Savings");

        assert!(store.remove_account(&id).await.unwrap().is_some());
        assert!(store.get_wallet_accounts("hd-1").await.unwrap().is_empty());
        assert!(store.remove_account(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_wallet_and_duplicate_wallet() {
        let store = InMemoryAccountStore::new();
        assert!(store.add_accounts("hd-9", vec![account("hd-9", 0)]).await.is_err());
        assert!(store
            .create_wallet(Wallet::new(IMPORTED_WALLET_ID, "again", WalletType::Imported))
            .await
            .is_err());
    }
}
