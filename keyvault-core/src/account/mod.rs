//! Account management functionality
//!
//! Wallets own accounts; the wallet type decides which keyring variant can
//! derive and sign for them. Account ids are deterministic so that
//! re-deriving the same index or re-adding the same watching address
//! collides instead of duplicating.

mod store;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use store::{AccountStore, InMemoryAccountStore};

/// Separator used inside account ids
pub const SEPARATOR: &str = "--";

/// Wallet id shared by all imported accounts
pub const IMPORTED_WALLET_ID: &str = "imported";

/// Wallet id shared by all watching accounts
pub const WATCHING_WALLET_ID: &str = "watching";

/// Account layout on chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountType {
    /// One key, one address
    Simple,
    /// Extended key spanning many addresses
    Utxo,
    /// One key with per-network address variants
    Variant,
}

/// Kind of wallet, selecting the keyring variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletType {
    Hd,
    Imported,
    Watching,
    Hardware,
}

impl WalletType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletType::Hd => "hd",
            WalletType::Imported => "imported",
            WalletType::Watching => "watching",
            WalletType::Hardware => "hw",
        }
    }

    pub fn can_sign(&self) -> bool {
        !matches!(self, WalletType::Watching)
    }
}

impl fmt::Display for WalletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WalletType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hd" => Ok(WalletType::Hd),
            "imported" => Ok(WalletType::Imported),
            "watching" => Ok(WalletType::Watching),
            "hw" | "hardware" => Ok(WalletType::Hardware),
            other => Err(Error::InvalidInput(format!("Unknown wallet type: {}", other))),
        }
    }
}

/// A wallet groups accounts under one credential source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: String,
    pub name: String,
    pub wallet_type: WalletType,
    pub accounts: Vec<String>,
}

impl Wallet {
    pub fn new(id: impl Into<String>, name: impl Into<String>, wallet_type: WalletType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            wallet_type,
            accounts: Vec::new(),
        }
    }
}

/// A derived, imported or watched account.
///
/// Everything except `name` is fixed once the account is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub path: String,
    pub coin_type: u32,
    /// Hex encoded public key; empty when the address does not reveal it
    #[serde(rename = "pub")]
    pub pub_key: String,
    pub address: String,
}

impl Account {
    /// Wallet id this account belongs to, read from the id prefix
    pub fn wallet_id(&self) -> &str {
        self.id.split(SEPARATOR).next().unwrap_or_default()
    }
}

/// `<walletId>--<path>` for HD and hardware accounts
pub fn hd_account_id(wallet_id: &str, path: &str) -> String {
    format!("{}{}{}", wallet_id, SEPARATOR, path)
}

/// `imported--<coinType>--<pubKeyHex>`
pub fn imported_account_id(coin_type: u32, pub_key_hex: &str) -> String {
    format!("{}{}{}{}{}", IMPORTED_WALLET_ID, SEPARATOR, coin_type, SEPARATOR, pub_key_hex)
}

/// `<prefix>--<coinType>--<target>` for watching accounts
pub fn watching_account_id(prefix: &str, coin_type: u32, target: &str) -> String {
    format!("{}{}{}{}{}", prefix, SEPARATOR, coin_type, SEPARATOR, target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_ids() {
        assert_eq!(hd_account_id("hd-1", "m/44'/60'/0'/0/0"), "hd-1--m/44'/60'/0'/0/0");
        assert_eq!(imported_account_id(501, "abcd"), "imported--501--abcd");
        assert_eq!(watching_account_id("watching", 283, "XYZ"), "watching--283--XYZ");
    }

    #[test]
    fn test_account_wallet_id() {
        let account = Account {
            id: hd_account_id("hd-7", "m/44'/501'/0'/0'"),
            name: "SOL #1".to_string(),
            account_type: AccountType::Simple,
            path: "m/44'/501'/0'/0'".to_string(),
            coin_type: 501,
            pub_key: String::new(),
            address: String::new(),
        };
        assert_eq!(account.wallet_id(), "hd-7");
    }

    #[test]
    fn test_account_serde_names() {
        let json = serde_json::json!({
            "id": "watching--60--0xabc",
            "name": "",
            "type": "SIMPLE",
            "path": "",
            "coin_type": 60,
            "pub": "",
            "address": "0xabc"
        });
        let account: Account = serde_json::from_value(json).unwrap();
        assert_eq!(account.account_type, AccountType::Simple);
        assert_eq!("hw".parse::<WalletType>().unwrap(), WalletType::Hardware);
    }
}
