//! Network metadata
//!
//! Networks are identified as `<impl>--<chainId>` (`evm--1`, `sol--101`).
//! The impl selects the chain plugin; everything else is metadata the vault
//! reads when building transactions.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::account::SEPARATOR;
use crate::chains::{plugin_for, ChainImpl};
use crate::error::{Error, Result};

/// Default fee parameters for a network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSettings {
    /// Gas limit used when the caller does not give one
    pub default_limit: u64,
    /// Gas price or flat fee used when the caller does not give one
    pub default_price: u128,
}

/// A network the vault can build transactions for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    pub name: String,
    #[serde(rename = "impl")]
    pub network_impl: ChainImpl,
    pub chain_id: String,
    pub symbol: String,
    pub decimals: u8,
    pub fee: FeeSettings,
}

impl Network {
    pub fn new(
        network_impl: ChainImpl,
        chain_id: &str,
        name: &str,
        symbol: &str,
        decimals: u8,
        fee: FeeSettings,
    ) -> Self {
        Self {
            id: network_id(network_impl, chain_id),
            name: name.to_string(),
            network_impl,
            chain_id: chain_id.to_string(),
            symbol: symbol.to_string(),
            decimals,
            fee,
        }
    }

    pub fn coin_type(&self) -> u32 {
        plugin_for(self.network_impl).coin_type()
    }
}

/// `<impl>--<chainId>`
pub fn network_id(network_impl: ChainImpl, chain_id: &str) -> String {
    format!("{}{}{}", network_impl, SEPARATOR, chain_id)
}

/// Chain family part of a network id
pub fn parse_network_impl(network_id: &str) -> Result<ChainImpl> {
    network_id
        .split(SEPARATOR)
        .next()
        .unwrap_or_default()
        .parse()
}

/// Source of network metadata
#[async_trait]
pub trait NetworkProvider: Send + Sync {
    async fn get_network(&self, network_id: &str) -> Result<Network>;

    async fn list_networks(&self) -> Result<Vec<Network>>;
}

/// Fixed network table
#[derive(Debug, Clone)]
pub struct StaticNetworkProvider {
    networks: BTreeMap<String, Network>,
}

impl Default for StaticNetworkProvider {
    fn default() -> Self {
        let evm_fee = FeeSettings {
            default_limit: 21_000,
            default_price: 5_000_000_000,
        };

        Self::new(vec![
            Network::new(ChainImpl::Evm, "1", "Ethereum", "ETH", 18, evm_fee),
            Network::new(ChainImpl::Evm, "56", "BNB Smart Chain", "BNB", 18, evm_fee),
            Network::new(ChainImpl::Evm, "137", "Polygon", "MATIC", 18, evm_fee),
            Network::new(
                ChainImpl::Sol,
                "101",
                "Solana",
                "SOL",
                9,
                FeeSettings {
                    default_limit: 0,
                    default_price: 5_000,
                },
            ),
            Network::new(
                ChainImpl::Algo,
                "4160",
                "Algorand",
                "ALGO",
                6,
                FeeSettings {
                    default_limit: 0,
                    default_price: crate::chains::algo::MIN_FEE as u128,
                },
            ),
        ])
    }
}

impl StaticNetworkProvider {
    pub fn new(networks: Vec<Network>) -> Self {
        Self {
            networks: networks.into_iter().map(|n| (n.id.clone(), n)).collect(),
        }
    }

    /// Add or replace a network
    pub fn with_network(mut self, network: Network) -> Self {
        self.networks.insert(network.id.clone(), network);
        self
    }
}

#[async_trait]
impl NetworkProvider for StaticNetworkProvider {
    async fn get_network(&self, network_id: &str) -> Result<Network> {
        self.networks
            .get(network_id)
            .cloned()
            .ok_or_else(|| Error::InvalidInput(format!("Unknown network: {}", network_id)))
    }

    async fn list_networks(&self) -> Result<Vec<Network>> {
        Ok(self.networks.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_registry() {
        let provider = StaticNetworkProvider::default();
        let network = provider.get_network("algo--4160").await.unwrap();
        assert_eq!(network.network_impl, ChainImpl::Algo);
        assert_eq!(network.coin_type(), 283);
        assert!(provider.get_network("tron--1").await.is_err());
        assert_eq!(provider.list_networks().await.unwrap().len(), 5);
    }

    #[test]
    fn test_network_id_parts() {
        assert_eq!(network_id(ChainImpl::Sol, "101"), "sol--101");
        assert_eq!(parse_network_impl("evm--137").unwrap(), ChainImpl::Evm);
        assert!(parse_network_impl("btc--0").is_err());
    }
}
