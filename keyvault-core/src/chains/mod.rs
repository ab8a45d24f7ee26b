//! Chain plugins
//!
//! Everything that differs between chain families lives behind
//! [`ChainPlugin`]: curve, derivation template, address codec, transaction
//! encoding and signing. Keyrings and vaults select a plugin from a
//! [`ChainImpl`] and never inspect chain names themselves.

pub mod algo;
pub mod evm;
pub mod sol;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::crypto::keys::{Curve, PublicKey};
use crate::error::{Error, Result};
use crate::signer::TxSigner;
use crate::transaction::{SignedTx, TxContext, UnsignedTx};

/// Chain family identifier, the `impl` part of a network id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainImpl {
    Evm,
    Sol,
    Algo,
}

impl ChainImpl {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainImpl::Evm => "evm",
            ChainImpl::Sol => "sol",
            ChainImpl::Algo => "algo",
        }
    }

    pub fn all() -> [ChainImpl; 3] {
        [ChainImpl::Evm, ChainImpl::Sol, ChainImpl::Algo]
    }
}

impl fmt::Display for ChainImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainImpl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "evm" => Ok(ChainImpl::Evm),
            "sol" => Ok(ChainImpl::Sol),
            "algo" => Ok(ChainImpl::Algo),
            other => Err(Error::NotSupported(format!("Unknown network impl: {}", other))),
        }
    }
}

/// Capabilities of a chain's vault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultSettings {
    pub fee_info_editable: bool,
    pub private_key_export_enabled: bool,
    pub token_enabled: bool,
    pub tx_can_be_replaced: bool,

    pub imported_account_enabled: bool,
    pub hardware_account_enabled: bool,
    pub external_account_enabled: bool,
    pub watching_account_enabled: bool,

    #[serde(rename = "isUTXOModel")]
    pub is_utxo_model: bool,

    pub cannot_send_to_self: bool,
    pub memo_supported: bool,
}

/// Chain-specific behaviour shared by every keyring and vault of one family
#[async_trait]
pub trait ChainPlugin: Send + Sync {
    fn chain_impl(&self) -> ChainImpl;

    fn curve(&self) -> Curve;

    fn coin_type(&self) -> u32;

    /// Default account name prefix, e.g. `EVM` in `EVM #1`
    fn account_name_prefix(&self) -> &'static str;

    /// Common parent of all account paths
    fn path_prefix(&self) -> String;

    /// Path of account `index` relative to [`ChainPlugin::path_prefix`]
    fn relative_path(&self, index: u32) -> String;

    fn settings(&self) -> VaultSettings;

    /// Largest transferable amount in the smallest unit
    fn max_amount(&self) -> u128 {
        u64::MAX as u128
    }

    /// Check an address and return its normalised form
    fn validate_address(&self, address: &str) -> Result<String>;

    fn address_from_public_key(&self, public_key: &PublicKey) -> Result<String>;

    /// Hex public key recoverable from an address, if the encoding carries it
    fn public_key_from_address(&self, address: &str) -> Option<String>;

    /// Whether a context was produced for this chain
    fn check_context(&self, context: &TxContext) -> Result<()> {
        if context.network_impl() != self.chain_impl().as_str() {
            return Err(Error::InvalidInput(format!(
                "{} context cannot be used on {}",
                context.network_impl(),
                self.chain_impl()
            )));
        }
        Ok(())
    }

    /// Encode, sign and serialise a transaction
    async fn sign_transaction(&self, unsigned: &UnsignedTx, signer: &dyn TxSigner) -> Result<SignedTx>;

    /// Sign a message with the chain's message scheme
    async fn sign_message(&self, message: &str, signer: &dyn TxSigner) -> Result<String>;

    /// Absolute path of account `index`
    fn account_path(&self, index: u32) -> String {
        format!("{}/{}", self.path_prefix(), self.relative_path(index))
    }
}

/// Select the plugin for a chain family
pub fn plugin_for(chain_impl: ChainImpl) -> Arc<dyn ChainPlugin> {
    match chain_impl {
        ChainImpl::Evm => Arc::new(evm::EvmPlugin),
        ChainImpl::Sol => Arc::new(sol::SolPlugin),
        ChainImpl::Algo => Arc::new(algo::AlgoPlugin),
    }
}

/// Find the plugin owning a coin type
pub fn plugin_for_coin_type(coin_type: u32) -> Option<Arc<dyn ChainPlugin>> {
    ChainImpl::all()
        .into_iter()
        .map(plugin_for)
        .find(|plugin| plugin.coin_type() == coin_type)
}

/// Reject signers whose curve does not match the chain
pub(crate) fn ensure_curve(plugin: &dyn ChainPlugin, signer: &dyn TxSigner) -> Result<()> {
    if signer.curve() != plugin.curve() {
        return Err(Error::Signing(format!(
            "{} requires a {} signer, got {}",
            plugin.chain_impl(),
            plugin.curve(),
            signer.curve()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_selection() {
        for chain_impl in ChainImpl::all() {
            assert_eq!(plugin_for(chain_impl).chain_impl(), chain_impl);
            assert_eq!(chain_impl.as_str().parse::<ChainImpl>().unwrap(), chain_impl);
        }
        assert_eq!(plugin_for_coin_type(283).unwrap().chain_impl(), ChainImpl::Algo);
        assert!(plugin_for_coin_type(0).is_none());
        assert!("tron".parse::<ChainImpl>().is_err());
    }

    #[test]
    fn test_account_paths() {
        assert_eq!(plugin_for(ChainImpl::Evm).account_path(2), "m/44'/60'/0'/0/2");
        assert_eq!(plugin_for(ChainImpl::Sol).account_path(2), "m/44'/501'/2'/0'");
        assert_eq!(plugin_for(ChainImpl::Algo).account_path(2), "m/44'/283'/0'/0'/2'");
    }

    #[test]
    fn test_settings_serde_names() {
        let json = serde_json::to_value(plugin_for(ChainImpl::Evm).settings()).unwrap();
        assert!(json.get("isUTXOModel").is_some());
        assert!(json.get("cannotSendToSelf").is_some());
    }
}
