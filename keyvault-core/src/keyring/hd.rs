//! HD keyring

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::account::{hd_account_id, Account, AccountType, WalletType};
use crate::credential::Credential;
use crate::crypto::cipher::Password;
use crate::crypto::keys::{batch_get_private_keys, batch_get_public_keys};
use crate::error::{CredentialError, Error, Result};
use crate::signer::Signer;
use crate::transaction::{SignedTx, UnsignedTx};
use super::{account_name, check_indexes, wrong_params, Keyring, KeyringContext, PrepareAccountsParams, SignCredentialOptions};

/// Accounts derived from the wallet seed along the chain's path template
pub struct HdKeyring {
    ctx: KeyringContext,
}

impl HdKeyring {
    pub fn new(ctx: KeyringContext) -> Self {
        Self { ctx }
    }

    async fn seed(&self, password: &Password) -> Result<Credential> {
        let credential = self.ctx.credentials.get_credential(&self.ctx.wallet_id, password).await?;
        match credential {
            Credential::Seed(_) => Ok(credential),
            Credential::PrivateKey(_) => Err(CredentialError::Corrupted(format!(
                "Wallet {} does not hold a seed",
                self.ctx.wallet_id
            ))
            .into()),
        }
    }
}

#[async_trait]
impl Keyring for HdKeyring {
    fn wallet_id(&self) -> &str {
        &self.ctx.wallet_id
    }

    fn wallet_type(&self) -> WalletType {
        WalletType::Hd
    }

    #[instrument(skip(self, params), fields(wallet_id = %self.ctx.wallet_id, chain = %self.ctx.plugin.chain_impl()))]
    async fn prepare_accounts(&self, params: &PrepareAccountsParams) -> Result<Vec<Account>> {
        let (password, indexes, names) = match params {
            PrepareAccountsParams::Hd {
                password,
                indexes,
                names,
            } => (password, indexes, names),
            other => return Err(wrong_params(WalletType::Hd, other)),
        };
        check_indexes(indexes)?;

        let plugin = &self.ctx.plugin;
        let relative_paths: Vec<String> = indexes.iter().map(|i| plugin.relative_path(*i)).collect();

        let seed = self.seed(password).await?;
        let infos = batch_get_public_keys(
            plugin.curve(),
            seed.expose(),
            &plugin.path_prefix(),
            &relative_paths,
        )?;
        drop(seed);

        if infos.len() != indexes.len() {
            return Err(Error::Derivation(format!(
                "Expected {} public keys, derived {}",
                indexes.len(),
                infos.len()
            )));
        }

        let accounts = infos
            .into_iter()
            .zip(indexes.iter())
            .enumerate()
            .map(|(position, (info, index))| -> Result<Account> {
                Ok(Account {
                    id: hd_account_id(&self.ctx.wallet_id, &info.path),
                    name: account_name(plugin.as_ref(), names, position, *index),
                    account_type: AccountType::Simple,
                    address: plugin.address_from_public_key(&info.public_key)?,
                    pub_key: info.public_key.to_hex(),
                    coin_type: plugin.coin_type(),
                    path: info.path,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(count = accounts.len(), "prepared hd accounts");
        Ok(accounts)
    }

    #[instrument(skip(self, password), fields(wallet_id = %self.ctx.wallet_id))]
    async fn get_signers(&self, password: &Password, addresses: &[String]) -> Result<HashMap<String, Signer>> {
        let accounts = self.ctx.accounts_for_addresses(addresses).await?;
        let paths: Vec<String> = accounts.iter().map(|a| a.path.clone()).collect();

        let seed = self.seed(password).await?;
        let keys = batch_get_private_keys(self.ctx.plugin.curve(), seed.expose(), &paths)?;
        drop(seed);

        let mut signers = HashMap::with_capacity(accounts.len());
        for (account, (_, key)) in accounts.iter().zip(keys) {
            let signer = Signer::new(key);
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
