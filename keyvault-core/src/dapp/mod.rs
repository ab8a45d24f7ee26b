//! Dapp authorization gate
//!
//! Requests from connected sites pass through [`DappGate`] before they can
//! reach a vault. Connections are keyed by the hostname of the requesting
//! origin plus the chain family its scope maps to.

mod approval;
mod connection;
mod gate;
mod notifier;
mod policy;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chains::ChainImpl;

pub use approval::{ApprovalPrompt, ApprovalResponse, ApprovalUi, PromptKind};
pub use connection::{ConnectionStore, DappConnection};
pub use gate::{ActiveContext, DappGate};
pub use notifier::{AccountsChanged, AccountsChangedNotifier, DEFAULT_NOTIFY_DELAY};
pub use policy::{GatePolicy, MismatchException};

/// A request from a dapp, as delivered by the provider bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DappRequest {
    #[serde(default = "new_request_id")]
    pub id: String,
    pub origin: String,
    /// Provider scope such as `ethereum` or `solana`
    #[serde(default)]
    pub scope: Option<String>,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

impl DappRequest {
    pub fn new(origin: &str, scope: Option<&str>, method: &str, params: serde_json::Value) -> Self {
        Self {
            id: new_request_id(),
            origin: origin.to_string(),
            scope: scope.map(str::to_string),
            method: method.to_string(),
            params,
        }
    }

    /// Chain family the request targets, if its scope is known
    pub fn network_impl(&self) -> Option<ChainImpl> {
        self.scope.as_deref().and_then(network_impl_from_scope)
    }
}

/// Map a provider scope to a chain family. Impl names are accepted as
/// scopes too.
pub fn network_impl_from_scope(scope: &str) -> Option<ChainImpl> {
    match scope {
        "ethereum" | "evm" => Some(ChainImpl::Evm),
        "solana" | "sol" => Some(ChainImpl::Sol),
        "algo" => Some(ChainImpl::Algo),
        _ => None,
    }
}

/// Whether a request scope is served by the active network. Requests
/// without a scope match anything.
pub fn scope_matches_network(scope: Option<&str>, active: Option<ChainImpl>) -> bool {
    match scope {
        None => true,
        Some(scope) => match (network_impl_from_scope(scope), active) {
            (Some(requested), Some(active)) => requested == active,
            _ => false,
        },
    }
}

/// Hostname part of an origin; connections match on this only
pub fn hostname(origin: &str) -> Option<String> {
    url::Url::parse(origin)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_mapping() {
        assert_eq!(network_impl_from_scope("ethereum"), Some(ChainImpl::Evm));
        assert_eq!(network_impl_from_scope("solana"), Some(ChainImpl::Sol));
        assert_eq!(network_impl_from_scope("evm"), Some(ChainImpl::Evm));
        assert_eq!(network_impl_from_scope("bitcoin"), None);

        assert!(scope_matches_network(None, None));
        assert!(scope_matches_network(Some("ethereum"), Some(ChainImpl::Evm)));
        assert!(!scope_matches_network(Some("solana"), Some(ChainImpl::Evm)));
        assert!(!scope_matches_network(Some("ethereum"), None));
    }

    #[test]
    fn test_hostname_ignores_path_and_scheme() {
        assert_eq!(hostname("https://a.example.com/page1").as_deref(), Some("a.example.com"));
        assert_eq!(hostname("http://a.example.com:8080/x?y=1").as_deref(), Some("a.example.com"));
        assert_eq!(hostname("not a url"), None);
    }

    #[test]
    fn test_request_deserialize_defaults() {
        let request: DappRequest = serde_json::from_value(serde_json::json!({
            "origin": "https://x.com",
            "method": "eth_accounts"
        }))
        .unwrap();
        assert!(request.scope.is_none());
        assert!(!request.id.is_empty());
        assert_eq!(request.network_impl(), None);
    }
}
