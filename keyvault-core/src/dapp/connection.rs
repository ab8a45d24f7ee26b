//! Site connections

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::chains::ChainImpl;
use crate::error::{Error, Result};
use super::hostname;

/// An approved link between a site and one address of a chain family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DappConnection {
    pub origin: String,
    pub network_impl: ChainImpl,
    pub address: String,
}

impl DappConnection {
    pub fn new(origin: &str, network_impl: ChainImpl, address: &str) -> Self {
        Self {
            origin: origin.to_string(),
            network_impl,
            address: address.to_string(),
        }
    }

    fn matches(&self, host: &str, network_impl: ChainImpl) -> bool {
        self.network_impl == network_impl && hostname(&self.origin).as_deref() == Some(host)
    }
}

/// Connections behind one lock; every mutation is applied as a whole
#[derive(Debug, Default)]
pub struct ConnectionStore {
    connections: RwLock<Vec<DappConnection>>,
}

impl ConnectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a connection, replacing the one for the same site and chain family
    pub async fn save(&self, connection: DappConnection) -> Result<()> {
        let host = hostname(&connection.origin)
            .ok_or_else(|| Error::InvalidInput(format!("Invalid origin: {}", connection.origin)))?;
        if connection.address.is_empty() {
            return Err(Error::InvalidInput("Connection address is empty".to_string()));
        }

        let mut connections = self.connections.write().await;
        connections.retain(|c| !c.matches(&host, connection.network_impl));
        debug!(host = %host, network_impl = %connection.network_impl, "connection saved");
        connections.push(connection);
        Ok(())
    }

    /// Connections for the site of `origin` on `network_impl`
    pub async fn find(&self, origin: &str, network_impl: ChainImpl) -> Vec<DappConnection> {
        let Some(host) = hostname(origin) else {
            return Vec::new();
        };
        self.connections
            .read()
            .await
            .iter()
            .filter(|c| c.matches(&host, network_impl) && !c.address.is_empty())
            .cloned()
            .collect()
    }

    /// Remove the site's connections holding any of `addresses`
    pub async fn remove(&self, origin: &str, network_impl: ChainImpl, addresses: &[String]) -> usize {
        let Some(host) = hostname(origin) else {
            return 0;
        };
        let mut connections = self.connections.write().await;
        let before = connections.len();
        connections.retain(|c| !(c.matches(&host, network_impl) && addresses.contains(&c.address)));
        before - connections.len()
    }

    /// Remove every connection to `address` on `network_impl`, whatever the site
    pub async fn remove_address(&self, network_impl: ChainImpl, address: &str) -> usize {
        let mut connections = self.connections.write().await;
        let before = connections.len();
        connections.retain(|c| !(c.network_impl == network_impl && c.address == address));
        before - connections.len()
    }

    pub async fn all(&self) -> Vec<DappConnection> {
        self.connections.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_replaces_same_site_and_impl() {
        let store = ConnectionStore::new();
        store
            .save(DappConnection::new("https://x.com/a", ChainImpl::Evm, "0x01"))
            .await
            .unwrap();
        store
            .save(DappConnection::new("https://x.com/b", ChainImpl::Evm, "0x02"))
            .await
            .unwrap();
        store
            .save(DappConnection::new("https://x.com", ChainImpl::Sol, "So1"))
            .await
            .unwrap();

        let evm = store.find("https://x.com/anything", ChainImpl::Evm).await;
        assert_eq!(evm.len(), 1);
        assert_eq!(evm[0].address, "0x02");
        assert_eq!(store.all().await.len(), 2);
    }

    #[tokio::test]
    async fn test_remove_by_site_and_by_address() {
        let store = ConnectionStore::new();
        store.save(DappConnection::new("https://x.com", ChainImpl::Evm, "0x01")).await.unwrap();
        store.save(DappConnection::new("https://y.com", ChainImpl::Evm, "0x01")).await.unwrap();

        assert_eq!(store.remove("https://x.com/p", ChainImpl::Evm, &["0x02".to_string()]).await, 0);
        assert_eq!(store.remove("https://x.com/p", ChainImpl::Evm, &["0x01".to_string()]).await, 1);
        assert_eq!(store.remove_address(ChainImpl::Evm, "0x01").await, 1);
        assert!(store.all().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_origin_rejected() {
        let store = ConnectionStore::new();
        assert!(store.save(DappConnection::new("x.com", ChainImpl::Evm, "0x01")).await.is_err());
        assert!(store.find("x.com", ChainImpl::Evm).await.is_empty());
    }
}
