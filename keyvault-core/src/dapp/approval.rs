//! Approval UI seam

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Which prompt the user is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    Connection,
    SignAndSend,
    AddToken,
    AddNetwork,
    SwitchNetwork,
    NetworkMismatch,
}

/// Everything the UI needs to render a prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalPrompt {
    /// Request id, used by the UI to route the answer back
    pub id: String,
    pub kind: PromptKind,
    pub origin: String,
    pub scope: Option<String>,
    pub method: String,
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum ApprovalResponse {
    Approved(serde_json::Value),
    Rejected,
}

/// User-facing collaborator. Debouncing and window management are its
/// business, not the gate's.
#[async_trait]
pub trait ApprovalUi: Send + Sync {
    /// Show a prompt and wait for the user's answer
    async fn request_approval(&self, prompt: ApprovalPrompt) -> ApprovalResponse;

    /// Tell the user the active network cannot serve a request. No answer
    /// is awaited.
    async fn show_network_mismatch(&self, prompt: ApprovalPrompt);
}
