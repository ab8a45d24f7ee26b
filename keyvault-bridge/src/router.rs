//! Provider request routing
//!
//! Every dApp request goes through the authorization gate first. Only
//! requests the user approved reach a vault.

use std::sync::Arc;

use keyvault_core::account::Account;
use keyvault_core::chains::ChainImpl;
use keyvault_core::crypto::cipher::Password;
use keyvault_core::dapp::{ActiveContext, DappRequest};
use keyvault_core::keyring::SignCredentialOptions;
use keyvault_core::network::NetworkProvider;
use keyvault_core::transaction::{FeeInfo, TransferInfo};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::error::{BridgeError, BridgeResult};
use crate::manager::WalletManager;

/// What the host application has selected. Supplied with every request.
#[derive(Debug, Clone)]
pub struct Session {
    pub network_id: String,
    pub account_id: Option<String>,
    /// Unlock password for signing requests; never forwarded to the UI
    pub password: Option<Password>,
}

impl Session {
    pub fn new(network_id: impl Into<String>) -> Self {
        Self {
            network_id: network_id.into(),
            account_id: None,
            password: None,
        }
    }

    pub fn with_account(mut self, account_id: impl Into<String>, password: Password) -> Self {
        self.account_id = Some(account_id.into());
        self.password = Some(password);
        self
    }
}

pub struct DappRouter {
    manager: Arc<WalletManager>,
}

impl DappRouter {
    pub fn new(manager: Arc<WalletManager>) -> Self {
        Self { manager }
    }

    #[instrument(skip(self, request, session), fields(origin = %request.origin, method = %request.method))]
    pub async fn handle(&self, request: &DappRequest, session: &Session) -> BridgeResult<Value> {
        let ctx = self.active_context(session).await?;
        let gate = self.manager.gate();

        match request.method.as_str() {
            "eth_requestAccounts" | "connect" | "algo_enable" => self.request_accounts(request, &ctx).await,
            "eth_accounts" => self.connected_addresses(request, &ctx).await,
            "eth_chainId" => chain_id(&ctx),
            "eth_sendTransaction" | "sendTransfer" => self.send_transfer(request, session, &ctx).await,
            "personal_sign" | "signMessage" => self.sign_message(request, session, &ctx).await,
            "wallet_watchAsset" => Ok(gate
                .open_add_token_modal(request, request.params.clone(), &ctx)
                .await?),
            "wallet_addEthereumChain" => Ok(gate
                .open_add_network_modal(request, request.params.clone(), &ctx)
                .await?),
            "wallet_switchEthereumChain" => Ok(gate
                .open_switch_network_modal(request, request.params.clone(), &ctx)
                .await?),
            "disconnect" | "wallet_disconnect" => self.disconnect(request, &ctx).await,
            other => Err(BridgeError::MethodNotFound(other.to_string())),
        }
    }

    async fn active_context(&self, session: &Session) -> BridgeResult<ActiveContext> {
        let factory = self.manager.factory();
        let network = factory.networks().get_network(&session.network_id).await?;
        let account = match &session.account_id {
            Some(account_id) => factory.accounts().get_account(account_id).await?,
            None => None,
        };
        Ok(ActiveContext::new(account, Some(network)))
    }

    async fn request_accounts(&self, request: &DappRequest, ctx: &ActiveContext) -> BridgeResult<Value> {
        let gate = self.manager.gate();
        if gate.is_authorized(request).await {
            return self.connected_addresses(request, ctx).await;
        }

        // The prompt offers the active account
        let mut prompt = request.clone();
        prompt.params = json!({ "address": ctx.account.as_ref().map(|a| a.address.clone()) });
        Ok(gate.open_connection_modal(&prompt, ctx).await?)
    }

    async fn connected_addresses(&self, request: &DappRequest, ctx: &ActiveContext) -> BridgeResult<Value> {
        let Some(network_impl) = request_impl(request, ctx) else {
            return Ok(json!([]));
        };
        let addresses: Vec<String> = self
            .manager
            .gate()
            .get_active_connected_accounts(&request.origin, network_impl, ctx.account.as_ref())
            .await
            .into_iter()
            .map(|c| c.address)
            .collect();
        Ok(json!(addresses))
    }

    async fn send_transfer(&self, request: &DappRequest, session: &Session, ctx: &ActiveContext) -> BridgeResult<Value> {
        let (account, password) = signing_account(session, ctx)?;
        let params = first_param(&request.params)?;

        if let Some(from) = params.get("from").and_then(Value::as_str) {
            if !from.eq_ignore_ascii_case(&account.address) {
                return Err(BridgeError::InvalidParams(format!("{} is not the active account", from)));
            }
        }
        let to = params
            .get("to")
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::InvalidParams("Missing `to`".to_string()))?;
        let amount = match params.get("value") {
            Some(value) => parse_quantity(value)?,
            None => 0,
        };
        let fee = match (params.get("gas"), params.get("gasPrice")) {
            (Some(limit), Some(price)) => Some(FeeInfo {
                limit: u64::try_from(parse_quantity(limit)?)
                    .map_err(|_| BridgeError::InvalidParams("Gas limit out of range".to_string()))?,
                price: parse_quantity(price)?,
            }),
            _ => None,
        };
        let transfer = TransferInfo {
            from: account.address.clone(),
            to: to.to_string(),
            amount,
            memo: params.get("memo").and_then(Value::as_str).map(str::to_string),
        };

        self.manager
            .gate()
            .open_sign_and_send_modal(request, params.clone(), ctx)
            .await?;

        let vault = self
            .manager
            .factory()
            .create_vault_for_account(&session.network_id, &account.id)
            .await?;
        let unsigned = vault.prepare_transfer(&transfer, fee).await?;
        let txid = vault
            .sign_and_send(&unsigned, &SignCredentialOptions::new(account.id.clone(), password))
            .await?;
        debug!(%txid, "transfer sent");
        Ok(json!(txid))
    }

    async fn sign_message(&self, request: &DappRequest, session: &Session, ctx: &ActiveContext) -> BridgeResult<Value> {
        let (account, password) = signing_account(session, ctx)?;
        let params = request
            .params
            .as_array()
            .ok_or_else(|| BridgeError::InvalidParams("Expected a params array".to_string()))?;
        let message = params
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::InvalidParams("Missing message".to_string()))?;
        if let Some(address) = params.get(1).and_then(Value::as_str) {
            if !address.eq_ignore_ascii_case(&account.address) {
                return Err(BridgeError::InvalidParams(format!("{} is not the active account", address)));
            }
        }

        self.manager
            .gate()
            .open_sign_and_send_modal(request, request.params.clone(), ctx)
            .await?;

        let vault = self
            .manager
            .factory()
            .create_vault_for_account(&session.network_id, &account.id)
            .await?;
        let mut signatures = vault
            .sign_message(
                &[message.to_string()],
                &SignCredentialOptions::new(account.id.clone(), password),
            )
            .await?;
        Ok(json!(signatures.pop()))
    }

    async fn disconnect(&self, request: &DappRequest, ctx: &ActiveContext) -> BridgeResult<Value> {
        let Some(network_impl) = request_impl(request, ctx) else {
            return Ok(json!(false));
        };
        let gate = self.manager.gate();
        let mut removed = 0;
        for connection in gate.get_active_connected_accounts(&request.origin, network_impl, None).await {
            removed += gate.cancel_connected_site(&connection).await;
        }
        Ok(json!(removed > 0))
    }
}

fn request_impl(request: &DappRequest, ctx: &ActiveContext) -> Option<ChainImpl> {
    request
        .network_impl()
        .or_else(|| ctx.network.as_ref().map(|n| n.network_impl))
}

fn signing_account(session: &Session, ctx: &ActiveContext) -> BridgeResult<(Account, Password)> {
    let account = ctx.account.clone().ok_or(BridgeError::NoActiveSession("account"))?;
    let password = session.password.clone().ok_or(BridgeError::NoActiveSession("password"))?;
    Ok((account, password))
}

fn chain_id(ctx: &ActiveContext) -> BridgeResult<Value> {
    let network = ctx.network.as_ref().ok_or(BridgeError::NoActiveSession("network"))?;
    if network.network_impl != ChainImpl::Evm {
        return Err(keyvault_core::Error::NotSupported(format!("{} has no EVM chain id", network.id)).into());
    }
    let id: u64 = network
        .chain_id
        .parse()
        .map_err(|_| keyvault_core::Error::InvalidInput(format!("Bad chain id {}", network.chain_id)))?;
    Ok(json!(format!("0x{:x}", id)))
}

/// `[ { .. } ]` or a bare object
fn first_param(params: &Value) -> BridgeResult<&Value> {
    let value = match params {
        Value::Array(items) => items.first(),
        Value::Object(_) => Some(params),
        _ => None,
    };
    value
        .filter(|v| v.is_object())
        .ok_or_else(|| BridgeError::InvalidParams("Expected a transaction object".to_string()))
}

/// Hex (`0x..`) or decimal quantity
fn parse_quantity(value: &Value) -> BridgeResult<u128> {
    let invalid = || BridgeError::InvalidParams(format!("Invalid quantity: {}", value));
    match value {
        Value::String(s) => match s.strip_prefix("0x") {
            Some("") => Ok(0),
            Some(hex) => u128::from_str_radix(hex, 16).map_err(|_| invalid()),
            None => s.parse().map_err(|_| invalid()),
        },
        Value::Number(n) => n.as_u64().map(u128::from).ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(&json!("0x10")).unwrap(), 16);
        assert_eq!(parse_quantity(&json!("0x")).unwrap(), 0);
        assert_eq!(parse_quantity(&json!("1000")).unwrap(), 1000);
        assert_eq!(parse_quantity(&json!(7)).unwrap(), 7);
        assert!(parse_quantity(&json!(-1)).is_err());
        assert!(parse_quantity(&json!("0xzz")).is_err());
    }

    #[test]
    fn test_first_param() {
        let params = json!([{"to": "0x01"}]);
        assert_eq!(first_param(&params).unwrap()["to"], "0x01");
        assert!(first_param(&json!([])).is_err());
        assert!(first_param(&json!(["0x01"])).is_err());
    }
}
