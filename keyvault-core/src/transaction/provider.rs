//! Chain client seam
//!
//! The vault never talks to an RPC endpoint itself. It asks a
//! [`ChainClient`] for the context a new transaction must be bound to and
//! hands it signed bytes to broadcast.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::network::Network;
use super::types::{SignedTx, TxContext};

/// RPC collaborator for one or more networks
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Fresh chain state for a transaction sent by `from`
    async fn tx_context(&self, network: &Network, from: &str) -> Result<TxContext>;

    /// Broadcast a signed transaction and return its hash
    async fn send(&self, network: &Network, signed: &SignedTx) -> Result<String>;
}

/// Chain client answering from fixed contexts and recording what it was
/// asked to send. Useful for tests and offline signing.
#[derive(Default)]
pub struct OfflineChainClient {
    contexts: HashMap<String, TxContext>,
    sent: Mutex<Vec<SignedTx>>,
}

impl OfflineChainClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `context` for every transaction on `network_id`
    pub fn with_context(mut self, network_id: &str, context: TxContext) -> Self {
        self.contexts.insert(network_id.to_string(), context);
        self
    }

    /// Transactions passed to `send` so far
    pub fn sent(&self) -> Vec<SignedTx> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChainClient for OfflineChainClient {
    async fn tx_context(&self, network: &Network, _from: &str) -> Result<TxContext> {
        self.contexts
            .get(&network.id)
            .cloned()
            .ok_or_else(|| Error::Network(format!("No context available for {}", network.id)))
    }

    async fn send(&self, network: &Network, signed: &SignedTx) -> Result<String> {
        if !self.contexts.contains_key(&network.id) {
            return Err(Error::Network(format!("Network {} is offline", network.id)));
        }
        self.sent
            .lock()
            .map_err(|_| Error::Network("Broadcast log poisoned".to_string()))?
            .push(signed.clone());
        Ok(signed.txid.clone())
    }
}
