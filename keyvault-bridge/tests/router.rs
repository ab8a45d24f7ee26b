//! End-to-end provider flow through the bridge

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use keyvault_bridge::{in_memory_manager, BridgeConfig, BridgeError, DappRouter, Session, WalletManager};
use keyvault_core::crypto::cipher::Password;
use keyvault_core::dapp::{ApprovalPrompt, ApprovalResponse, ApprovalUi, DappRequest, PromptKind};
use keyvault_core::transaction::{OfflineChainClient, TxContext};
use serde_json::{json, Value};

const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
const ORIGIN: &str = "https://app.example.com";

/// Approves everything; connection prompts are answered with the offered
/// address
struct ApproveAll;

#[async_trait]
impl ApprovalUi for ApproveAll {
    async fn request_approval(&self, prompt: ApprovalPrompt) -> ApprovalResponse {
        match prompt.kind {
            PromptKind::Connection => ApprovalResponse::Approved(prompt.params["address"].clone()),
            _ => ApprovalResponse::Approved(json!(true)),
        }
    }

    async fn show_network_mismatch(&self, _prompt: ApprovalPrompt) {}
}

fn config() -> BridgeConfig {
    BridgeConfig {
        kdf_iterations: 1_000,
        notify_delay: Duration::from_millis(20),
        ..Default::default()
    }
}

fn setup() -> (Arc<WalletManager>, Arc<OfflineChainClient>) {
    let client = Arc::new(
        OfflineChainClient::new().with_context("evm--1", TxContext::Evm { chain_id: 1, nonce: 0 }),
    );
    let manager = in_memory_manager(&config(), Arc::new(ApproveAll), client.clone()).unwrap();
    (Arc::new(manager), client)
}

fn request(method: &str, params: Value) -> DappRequest {
    DappRequest::new(ORIGIN, Some("ethereum"), method, params)
}

#[tokio::test]
async fn test_connect_sign_and_send() {
    let (manager, client) = setup();
    let router = DappRouter::new(manager.clone());
    let password = Password::new("pass1234");

    let wallet = manager.create_hd_wallet("Main", MNEMONIC, &password).await.unwrap();
    let accounts = manager
        .add_hd_accounts("evm--1", &wallet.id, &password, vec![0, 1])
        .await
        .unwrap();
    let session = Session::new("evm--1").with_account(accounts[0].id.clone(), password.clone());

    assert_eq!(router.handle(&request("eth_accounts", json!([])), &session).await.unwrap(), json!([]));

    let connected = router
        .handle(&request("eth_requestAccounts", json!([])), &session)
        .await
        .unwrap();
    assert_eq!(connected, json!(["0x9858effd232b4033e47d90003d41ec34ecaeda94"]));

    // A later visit sees whichever account is active
    let other = Session::new("evm--1").with_account(accounts[1].id.clone(), password.clone());
    assert_eq!(
        router.handle(&request("eth_accounts", json!([])), &other).await.unwrap(),
        json!([accounts[1].address])
    );

    assert_eq!(router.handle(&request("eth_chainId", json!([])), &session).await.unwrap(), json!("0x1"));

    let txid = router
        .handle(
            &request(
                "eth_sendTransaction",
                json!([{ "from": accounts[0].address, "to": accounts[1].address, "value": "0x10" }]),
            ),
            &session,
        )
        .await
        .unwrap();
    let sent = client.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(json!(sent[0].txid), txid);

    let signature = router
        .handle(
            &request("personal_sign", json!(["0x68656c6c6f", accounts[0].address])),
            &session,
        )
        .await
        .unwrap();
    assert_eq!(signature.as_str().unwrap().len(), 132);
}

#[tokio::test]
async fn test_rejections_map_to_codes() {
    let (manager, _client) = setup();
    let router = DappRouter::new(manager.clone());
    let session = Session::new("evm--1");

    let err = router.handle(&request("eth_foo", json!([])), &session).await.unwrap_err();
    assert_eq!(err.code(), -32601);

    // Not connected
    let err = router
        .handle(&request("personal_sign", json!(["0x00"])), &session)
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::NoActiveSession("account")));

    // Solana request while EVM is active
    let err = router
        .handle(&DappRequest::new(ORIGIN, Some("solana"), "connect", Value::Null), &session)
        .await
        .unwrap_err();
    assert_eq!(err.code(), 4901);
}

#[tokio::test]
async fn test_remove_account_cleans_up() {
    let (manager, _client) = setup();
    let router = DappRouter::new(manager.clone());
    let password = Password::new("pass1234");

    let imported = manager
        .import_private_key("evm--1", &"11".repeat(32), "Imported", &password)
        .await
        .unwrap();
    let session = Session::new("evm--1").with_account(imported.id.clone(), password);
    router
        .handle(&request("eth_requestAccounts", json!([])), &session)
        .await
        .unwrap();
    assert_eq!(manager.gate().connections().await.len(), 1);
    router
        .handle(&request("personal_sign", json!(["0x68656c6c6f", imported.address])), &session)
        .await
        .unwrap();
    assert_eq!(manager.factory().signing_locks().len(), 1);

    let removed = manager.remove_account(&imported.id).await.unwrap();
    assert_eq!(removed.map(|a| a.id), Some(imported.id.clone()));
    assert!(manager.gate().connections().await.is_empty());
    assert!(!manager.factory().credentials().has_credential(&imported.id).await.unwrap());
    assert!(manager.factory().signing_locks().is_empty());

    assert!(manager.remove_account(&imported.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_watching_and_rename() {
    let (manager, _client) = setup();

    assert!(manager.add_watching_account("sol--101", "0xnope", "Bad").await.is_err());
    let watched = manager
        .add_watching_account("evm--1", "0x9858EfFD232B4033E47d90003D41EC34EcaEda94", "Cold")
        .await
        .unwrap();

    let renamed = manager.rename_account(&watched.id, "Cold storage").await.unwrap();
    assert_eq!(renamed.name, "Cold storage");
    assert!(manager.rename_account(&watched.id, "  ").await.is_err());
}
