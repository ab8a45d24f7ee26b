//! Dapp authorization gate

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use keyvault_core::chains::ChainImpl;
use keyvault_core::dapp::{
    AccountsChangedNotifier, ActiveContext, ApprovalPrompt, ApprovalResponse, ApprovalUi, DappConnection, DappGate,
    DappRequest, GatePolicy, PromptKind,
};
use keyvault_core::network::{NetworkProvider, StaticNetworkProvider};
use keyvault_core::Error;
use serde_json::{json, Value};

/// Approval UI answering every prompt the same way and recording what it saw
#[derive(Default)]
struct RecordingUi {
    answer: Option<Value>,
    prompts: Mutex<Vec<ApprovalPrompt>>,
}

impl RecordingUi {
    fn approving(value: Value) -> Arc<Self> {
        Arc::new(Self {
            answer: Some(value),
            ..Default::default()
        })
    }

    fn rejecting() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn kinds(&self) -> Vec<PromptKind> {
        self.prompts.lock().unwrap().iter().map(|p| p.kind).collect()
    }
}

#[async_trait]
impl ApprovalUi for RecordingUi {
    async fn request_approval(&self, prompt: ApprovalPrompt) -> ApprovalResponse {
        self.prompts.lock().unwrap().push(prompt);
        match &self.answer {
            Some(value) => ApprovalResponse::Approved(value.clone()),
            None => ApprovalResponse::Rejected,
        }
    }

    async fn show_network_mismatch(&self, prompt: ApprovalPrompt) {
        self.prompts.lock().unwrap().push(prompt);
    }
}

const ADDRESS: &str = "0x9858effd232b4033e47d90003d41ec34ecaeda94";

async fn context(network_id: &str) -> ActiveContext {
    let network = StaticNetworkProvider::default().get_network(network_id).await.unwrap();
    ActiveContext::new(None, Some(network))
}

fn gate(policy: GatePolicy, ui: Arc<RecordingUi>) -> DappGate {
    DappGate::new(policy, ui, AccountsChangedNotifier::new(Duration::from_millis(20)))
}

#[tokio::test]
async fn test_connections_match_on_hostname() {
    let gate = gate(GatePolicy::default(), RecordingUi::rejecting());
    gate.save_connected_accounts(DappConnection::new("https://app.example.com/swap", ChainImpl::Evm, "0xaa"))
        .await
        .unwrap();

    let same_site = DappRequest::new("https://app.example.com/pool?x=1", Some("ethereum"), "eth_accounts", Value::Null);
    assert!(gate.is_authorized(&same_site).await);
    assert!(gate.authorized_required(&same_site).await.is_ok());

    let other_site = DappRequest::new("https://evil.example.com", Some("ethereum"), "eth_accounts", Value::Null);
    assert!(matches!(
        gate.authorized_required(&other_site).await,
        Err(Error::Unauthorized(_))
    ));

    let by_impl = DappRequest::new("https://app.example.com/anything", Some("evm"), "eth_accounts", Value::Null);
    assert!(gate.is_authorized(&by_impl).await);

    let other_chain = DappRequest::new("https://app.example.com", Some("solana"), "connect", Value::Null);
    assert!(!gate.is_authorized(&other_chain).await);

    let no_scope = DappRequest::new("https://app.example.com", None, "eth_accounts", Value::Null);
    assert!(!gate.is_authorized(&no_scope).await);
}

#[tokio::test]
async fn test_remove_connected_accounts_notifies_once() {
    let gate = gate(GatePolicy::default(), RecordingUi::rejecting());
    let mut events = gate.notifier().subscribe();
    gate.save_connected_accounts(DappConnection::new("https://a.com", ChainImpl::Evm, "0xaa"))
        .await
        .unwrap();
    gate.save_connected_accounts(DappConnection::new("https://b.com", ChainImpl::Evm, "0xaa"))
        .await
        .unwrap();

    let removed = gate
        .remove_connected_accounts("https://a.com/page", ChainImpl::Evm, &["0xaa".to_string()])
        .await;
    assert_eq!(removed, 1);
    let request = DappRequest::new("https://a.com/anything", Some("evm"), "eth_accounts", Value::Null);
    assert!(!gate.is_authorized(&request).await);
    assert_eq!(gate.remove_address(ChainImpl::Evm, "0xaa").await, 1);
    assert!(gate.connections().await.is_empty());

    let event = tokio::time::timeout(Duration::from_secs(1), events.recv()).await.unwrap().unwrap();
    assert_eq!(event.sequence, 1);
    assert!(tokio::time::timeout(Duration::from_millis(100), events.recv()).await.is_err());
}

#[tokio::test]
async fn test_cancel_connected_site() {
    let gate = gate(GatePolicy::default(), RecordingUi::rejecting());
    let mut events = gate.notifier().subscribe();
    let connection = DappConnection::new("https://a.com", ChainImpl::Sol, "So1");
    gate.save_connected_accounts(connection.clone()).await.unwrap();

    assert_eq!(gate.cancel_connected_site(&connection).await, 1);
    assert_eq!(events.recv().await.unwrap().sequence, 1);
}

#[tokio::test]
async fn test_rejected_connection_persists_nothing() {
    let ui = RecordingUi::rejecting();
    let gate = gate(GatePolicy::default(), ui.clone());
    let request = DappRequest::new("https://a.com", Some("ethereum"), "eth_requestAccounts", Value::Null);

    let err = gate.open_connection_modal(&request, &context("evm--1").await).await.unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));
    assert!(gate.connections().await.is_empty());
    assert_eq!(ui.kinds(), vec![PromptKind::Connection]);
}

#[tokio::test]
async fn test_network_mismatch() {
    let ui = RecordingUi::approving(json!("ok"));
    let gate = gate(GatePolicy::default(), ui.clone());
    let ctx = context("evm--1").await;

    // Empty-result method resolves with an empty list
    let request = DappRequest::new("https://a.com", Some("solana"), "eth_requestAccounts", Value::Null);
    assert_eq!(gate.open_connection_modal(&request, &ctx).await.unwrap(), json!([]));

    let request = DappRequest::new("https://a.com", Some("solana"), "wallet_addEthereumChain", Value::Null);
    let err = gate.open_add_network_modal(&request, json!({}), &ctx).await.unwrap_err();
    assert!(matches!(err, Error::NetworkMismatch { .. }));
    assert!(err.to_string().contains("method=wallet_addEthereumChain"));

    assert_eq!(ui.kinds(), vec![PromptKind::NetworkMismatch, PromptKind::NetworkMismatch]);
}

#[tokio::test]
async fn test_mismatch_exception_only_suppresses_prompt() {
    let policy = GatePolicy::from_json(
        r#"{"mismatch_exceptions": [{"origin": "https://opensea.io", "scope": "solana"}]}"#,
    )
    .unwrap();
    let ui = RecordingUi::approving(json!("ok"));
    let gate = gate(policy, ui.clone());
    let ctx = context("evm--1").await;

    let request = DappRequest::new("https://opensea.io", Some("solana"), "signTransaction", Value::Null);
    let err = gate.open_sign_and_send_modal(&request, json!({}), &ctx).await.unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));
    assert!(ui.kinds().is_empty());

    // Other origins still see the prompt
    let request = DappRequest::new("https://other.io", Some("solana"), "signTransaction", Value::Null);
    assert!(gate.open_sign_and_send_modal(&request, json!({}), &ctx).await.is_err());
    assert_eq!(ui.kinds(), vec![PromptKind::NetworkMismatch]);
}

#[tokio::test]
async fn test_sign_and_send_after_connect() {
    let ui = RecordingUi::approving(json!(ADDRESS));
    let gate = gate(GatePolicy::default(), ui.clone());
    let ctx = context("evm--1").await;

    let connect = DappRequest::new("https://a.com", Some("ethereum"), "eth_requestAccounts", Value::Null);
    assert_eq!(gate.open_connection_modal(&connect, &ctx).await.unwrap(), json!([ADDRESS]));

    let send = DappRequest::new("https://a.com/app", Some("ethereum"), "eth_sendTransaction", Value::Null);
    let result = gate
        .open_sign_and_send_modal(&send, json!({"to": "0xbb"}), &ctx)
        .await
        .unwrap();
    assert_eq!(result, json!(ADDRESS));

    let prompts = ui.prompts.lock().unwrap();
    assert_eq!(prompts[1].kind, PromptKind::SignAndSend);
    assert_eq!(prompts[1].params, json!({"to": "0xbb"}));
}

#[tokio::test]
async fn test_connection_with_invalid_address_is_not_saved() {
    let ui = RecordingUi::approving(json!("0xaa"));
    let gate = gate(GatePolicy::default(), ui);
    let ctx = context("evm--1").await;

    let connect = DappRequest::new("https://a.com", Some("ethereum"), "eth_requestAccounts", Value::Null);
    let err = gate.open_connection_modal(&connect, &ctx).await.unwrap_err();
    assert!(matches!(err, Error::InvalidAddress(_)));
    assert!(!gate.is_authorized(&connect).await);
    assert!(gate.connections().await.is_empty());
}

#[tokio::test]
async fn test_rejected_sign_and_send() {
    let ui = RecordingUi::rejecting();
    let gate = gate(GatePolicy::default(), ui);
    gate.save_connected_accounts(DappConnection::new("https://a.com", ChainImpl::Evm, "0xaa"))
        .await
        .unwrap();

    let send = DappRequest::new("https://a.com", Some("ethereum"), "eth_sendTransaction", Value::Null);
    let err = gate
        .open_sign_and_send_modal(&send, json!({}), &context("evm--1").await)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UserRejected));
}
