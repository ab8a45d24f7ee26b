//! Imported keyring

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::account::{imported_account_id, Account, AccountType, WalletType};
use crate::chains::ChainPlugin;
use crate::credential::Credential;
use crate::crypto::cipher::Password;
use crate::crypto::keys::PrivateKey;
use crate::error::{CredentialError, Error, Result};
use crate::signer::Signer;
use crate::transaction::{SignedTx, UnsignedTx};
use super::{wrong_params, Keyring, KeyringContext, PrepareAccountsParams, SignCredentialOptions};

/// Id an imported private key is stored under; equal to the account id
pub fn imported_credential_id(plugin: &dyn ChainPlugin, private_key: &PrivateKey) -> Result<String> {
    let public_key = private_key.public_key()?;
    Ok(imported_account_id(plugin.coin_type(), &public_key.to_hex()))
}

/// Accounts backed by individually imported private keys. Each account's
/// credential is stored under its account id.
pub struct ImportedKeyring {
    ctx: KeyringContext,
}

impl ImportedKeyring {
    pub fn new(ctx: KeyringContext) -> Self {
        Self { ctx }
    }

    async fn private_key(&self, credential_id: &str, password: &Password) -> Result<PrivateKey> {
        let credential = self.ctx.credentials.get_credential(credential_id, password).await?;
        match &credential {
            Credential::PrivateKey(bytes) => PrivateKey::from_slice(bytes, self.ctx.plugin.curve()),
            Credential::Seed(_) => Err(CredentialError::Corrupted(format!(
                "Credential {} is not a private key",
                credential_id
            ))
            .into()),
        }
    }
}

#[async_trait]
impl Keyring for ImportedKeyring {
    fn wallet_id(&self) -> &str {
        &self.ctx.wallet_id
    }

    fn wallet_type(&self) -> WalletType {
        WalletType::Imported
    }

    #[instrument(skip(self, params), fields(chain = %self.ctx.plugin.chain_impl()))]
    async fn prepare_accounts(&self, params: &PrepareAccountsParams) -> Result<Vec<Account>> {
        let (password, credential_id, name) = match params {
            PrepareAccountsParams::Imported {
                password,
                credential_id,
                name,
            } => (password, credential_id, name),
            other => return Err(wrong_params(WalletType::Imported, other)),
        };

        let plugin = &self.ctx.plugin;
        let private_key = self.private_key(credential_id, password).await?;
        let public_key = private_key.public_key()?;
        drop(private_key);

        let id = imported_account_id(plugin.coin_type(), &public_key.to_hex());
        if &id != credential_id {
            return Err(Error::InvalidInput(format!(
                "Credential {} does not hold the key for {}",
                credential_id, id
            )));
        }

        let account = Account {
            id,
            name: name.clone(),
            account_type: AccountType::Simple,
            path: String::new(),
            coin_type: plugin.coin_type(),
            pub_key: public_key.to_hex(),
            address: plugin.address_from_public_key(&public_key)?,
        };
        info!(account_id = %account.id, "prepared imported account");
        Ok(vec![account])
    }

    #[instrument(skip(self, password), fields(wallet_id = %self.ctx.wallet_id))]
    async fn get_signers(&self, password: &Password, addresses: &[String]) -> Result<HashMap<String, Signer>> {
        let accounts = self.ctx.accounts_for_addresses(addresses).await?;

        let mut signers = HashMap::with_capacity(accounts.len());
        for account in &accounts {
            let signer = Signer::new(self.private_key(&account.id, password).await?);
            self.ctx.check_signer(account, &signer)?;
            signers.insert(account.address.clone(), signer);
        }
        Ok(signers)
    }

    #[instrument(skip(self, unsigned, options), fields(account_id = %options.account_id))]
    async fn sign_transaction(&self, unsigned: &UnsignedTx, options: &SignCredentialOptions) -> Result<SignedTx> {
        self.ctx.sign_transaction_with(self, unsigned, options).await
    }

    #[instrument(skip(self, messages, options), fields(account_id = %options.account_id))]
    async fn sign_message(&self, messages: &[String], options: &SignCredentialOptions) -> Result<Vec<String>> {
        self.ctx.sign_messages_with(self, messages, options).await
    }
}
