//! Watching keyring

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::instrument;

use crate::account::{watching_account_id, Account, AccountType, WalletType};
use crate::crypto::cipher::Password;
use crate::error::{Error, Result};
use crate::signer::Signer;
use crate::transaction::{SignedTx, UnsignedTx};
use super::{wrong_params, Keyring, KeyringContext, PrepareAccountsParams, SignCredentialOptions};

/// Address-only accounts. Nothing to decrypt, nothing to sign with.
pub struct WatchingKeyring {
    ctx: KeyringContext,
}

impl WatchingKeyring {
    pub fn new(ctx: KeyringContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Keyring for WatchingKeyring {
    fn wallet_id(&self) -> &str {
        &self.ctx.wallet_id
    }

    fn wallet_type(&self) -> WalletType {
        WalletType::Watching
    }

    #[instrument(skip(self, params), fields(chain = %self.ctx.plugin.chain_impl()))]
    async fn prepare_accounts(&self, params: &PrepareAccountsParams) -> Result<Vec<Account>> {
        let (target, name, account_id_prefix) = match params {
            PrepareAccountsParams::Watching {
                target,
                name,
                account_id_prefix,
            } => (target, name, account_id_prefix),
            other => return Err(wrong_params(WalletType::Watching, other)),
        };

        let plugin = &self.ctx.plugin;
        let address = plugin.validate_address(target)?;
        let coin_type = plugin.coin_type();

        Ok(vec![Account {
            id: watching_account_id(account_id_prefix, coin_type, &address),
            name: name.clone(),
            account_type: AccountType::Simple,
            path: String::new(),
            coin_type,
            pub_key: plugin.public_key_from_address(&address).unwrap_or_default(),
            address,
        }])
    }

    async fn get_signers(&self, _password: &Password, _addresses: &[String]) -> Result<HashMap<String, Signer>> {
        Err(Error::NotSupported("Watching accounts have no signers".to_string()))
    }

    async fn sign_transaction(&self, _unsigned: &UnsignedTx, _options: &SignCredentialOptions) -> Result<SignedTx> {
        Err(Error::NotSupported("Watching accounts cannot sign transactions".to_string()))
    }

    async fn sign_message(&self, _messages: &[String], _options: &SignCredentialOptions) -> Result<Vec<String>> {
        Err(Error::NotSupported("Watching accounts cannot sign messages".to_string()))
    }
}
