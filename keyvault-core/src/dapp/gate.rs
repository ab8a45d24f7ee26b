//! Authorization gate in front of the vaults

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use crate::account::Account;
use crate::chains::{plugin_for, ChainImpl};
use crate::error::{Error, Result};
use crate::network::Network;
use super::{
    scope_matches_network, AccountsChangedNotifier, ApprovalPrompt, ApprovalResponse, ApprovalUi,
    ConnectionStore, DappConnection, DappRequest, GatePolicy, PromptKind,
};

/// What the user currently has selected. Passed in on every call; the gate
/// keeps no notion of an active account of its own.
#[derive(Debug, Clone, Default)]
pub struct ActiveContext {
    pub account: Option<Account>,
    pub network: Option<Network>,
}

impl ActiveContext {
    pub fn new(account: Option<Account>, network: Option<Network>) -> Self {
        Self { account, network }
    }

    fn network_impl(&self) -> Option<ChainImpl> {
        self.network.as_ref().map(|n| n.network_impl)
    }
}

pub struct DappGate {
    connections: ConnectionStore,
    policy: GatePolicy,
    ui: Arc<dyn ApprovalUi>,
    notifier: AccountsChangedNotifier,
}

impl DappGate {
    pub fn new(policy: GatePolicy, ui: Arc<dyn ApprovalUi>, notifier: AccountsChangedNotifier) -> Self {
        Self {
            connections: ConnectionStore::new(),
            policy,
            ui,
            notifier,
        }
    }

    pub fn notifier(&self) -> &AccountsChangedNotifier {
        &self.notifier
    }

    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    pub async fn connections(&self) -> Vec<DappConnection> {
        self.connections.all().await
    }

    pub async fn is_authorized(&self, request: &DappRequest) -> bool {
        let Some(network_impl) = request.network_impl() else {
            return false;
        };
        !self.connections.find(&request.origin, network_impl).await.is_empty()
    }

    pub async fn authorized_required(&self, request: &DappRequest) -> Result<()> {
        if self.is_authorized(request).await {
            Ok(())
        } else {
            Err(unauthorized(request))
        }
    }

    /// Connected entries for the site. A compatible active account stands in
    /// for the stored address.
    pub async fn get_active_connected_accounts(
        &self,
        origin: &str,
        network_impl: ChainImpl,
        active: Option<&Account>,
    ) -> Vec<DappConnection> {
        let mut connections = self.connections.find(origin, network_impl).await;
        if let Some(account) = active {
            if account.coin_type == plugin_for(network_impl).coin_type() && !account.address.is_empty() {
                for connection in connections.iter_mut() {
                    connection.address = account.address.clone();
                }
            }
        }
        connections
    }

    pub async fn save_connected_accounts(&self, connection: DappConnection) -> Result<()> {
        self.connections.save(connection).await
    }

    /// Drop the site's connections to `addresses` and schedule an
    /// accounts-changed notification
    #[instrument(skip(self, addresses))]
    pub async fn remove_connected_accounts(
        &self,
        origin: &str,
        network_impl: ChainImpl,
        addresses: &[String],
    ) -> usize {
        let removed = self.connections.remove(origin, network_impl, addresses).await;
        self.notifier.schedule();
        removed
    }

    /// Disconnect a site on user request; listeners hear about it right away
    pub async fn cancel_connected_site(&self, connection: &DappConnection) -> usize {
        let removed = self
            .connections
            .remove(&connection.origin, connection.network_impl, std::slice::from_ref(&connection.address))
            .await;
        info!(origin = %connection.origin, removed, "site disconnected");
        self.notifier.notify_now();
        removed
    }

    /// Forget every connection of a removed account
    pub async fn remove_address(&self, network_impl: ChainImpl, address: &str) -> usize {
        let removed = self.connections.remove_address(network_impl, address).await;
        if removed > 0 {
            self.notifier.schedule();
        }
        removed
    }

    /// Ask the user to connect an account. The approval value is the chosen
    /// address; the result is the list of connected addresses.
    #[instrument(skip(self, request, ctx), fields(origin = %request.origin))]
    pub async fn open_connection_modal(&self, request: &DappRequest, ctx: &ActiveContext) -> Result<Value> {
        let network_impl = request
            .network_impl()
            .or_else(|| ctx.network_impl())
            .ok_or_else(|| unauthorized(request))?;

        let outcome = self
            .open_modal(request, PromptKind::Connection, request.params.clone(), ctx, false)
            .await;
        let value = match outcome {
            Ok(ModalOutcome::Approved(value)) => value,
            Ok(ModalOutcome::Resolved(value)) => return Ok(value),
            Err(Error::UserRejected) => return Err(unauthorized(request)),
            Err(e) => return Err(e),
        };

        let address = value
            .as_str()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| Error::InvalidInput("Approval did not return an address".to_string()))?;
        let address = plugin_for(network_impl).validate_address(address)?;
        self.connections
            .save(DappConnection::new(&request.origin, network_impl, &address))
            .await?;
        self.notifier.notify_now();
        info!(network_impl = %network_impl, "site connected");
        Ok(json!([address]))
    }

    pub async fn open_sign_and_send_modal(
        &self,
        request: &DappRequest,
        params: Value,
        ctx: &ActiveContext,
    ) -> Result<Value> {
        self.open_modal(request, PromptKind::SignAndSend, params, ctx, true)
            .await
            .map(ModalOutcome::into_value)
    }

    pub async fn open_add_token_modal(&self, request: &DappRequest, params: Value, ctx: &ActiveContext) -> Result<Value> {
        self.open_modal(request, PromptKind::AddToken, params, ctx, false)
            .await
            .map(ModalOutcome::into_value)
    }

    pub async fn open_add_network_modal(&self, request: &DappRequest, params: Value, ctx: &ActiveContext) -> Result<Value> {
        self.open_modal(request, PromptKind::AddNetwork, params, ctx, false)
            .await
            .map(ModalOutcome::into_value)
    }

    pub async fn open_switch_network_modal(
        &self,
        request: &DappRequest,
        params: Value,
        ctx: &ActiveContext,
    ) -> Result<Value> {
        self.open_modal(request, PromptKind::SwitchNetwork, params, ctx, false)
            .await
            .map(ModalOutcome::into_value)
    }

    async fn open_modal(
        &self,
        request: &DappRequest,
        kind: PromptKind,
        params: Value,
        ctx: &ActiveContext,
        auth_required: bool,
    ) -> Result<ModalOutcome> {
        let scope = request.scope.as_deref();
        let not_authorized = auth_required && !self.is_authorized(request).await;
        let not_matched = !scope_matches_network(scope, ctx.network_impl());

        if not_authorized || not_matched {
            if self.policy.suppresses_mismatch_prompt(&request.origin, scope) {
                info!(origin = %request.origin, method = %request.method, "mismatch prompt suppressed");
            } else {
                let prompt = prompt_for(request, PromptKind::NetworkMismatch, params);
                self.ui.show_network_mismatch(prompt).await;
            }

            if self.policy.is_empty_result_method(&request.method) {
                return Ok(ModalOutcome::Resolved(json!([])));
            }
            warn!(
                origin = %request.origin,
                method = %request.method,
                not_authorized,
                not_matched,
                "request refused"
            );
            return Err(if not_authorized {
                unauthorized(request)
            } else {
                Error::NetworkMismatch {
                    method: request.method.clone(),
                    scope: scope.unwrap_or_default().to_string(),
                    origin: request.origin.clone(),
                }
            });
        }

        match self.ui.request_approval(prompt_for(request, kind, params)).await {
            ApprovalResponse::Approved(value) => Ok(ModalOutcome::Approved(value)),
            ApprovalResponse::Rejected => Err(Error::UserRejected),
        }
    }
}

enum ModalOutcome {
    /// The user approved the prompt
    Approved(Value),
    /// Settled without a prompt
    Resolved(Value),
}

impl ModalOutcome {
    fn into_value(self) -> Value {
        match self {
            ModalOutcome::Approved(value) | ModalOutcome::Resolved(value) => value,
        }
    }
}

fn prompt_for(request: &DappRequest, kind: PromptKind, params: Value) -> ApprovalPrompt {
    ApprovalPrompt {
        id: request.id.clone(),
        kind,
        origin: request.origin.clone(),
        scope: request.scope.clone(),
        method: request.method.clone(),
        params,
    }
}

fn unauthorized(request: &DappRequest) -> Error {
    Error::Unauthorized(format!("{} is not connected", request.origin))
}
