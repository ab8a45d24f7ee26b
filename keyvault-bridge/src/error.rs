//! Bridge errors and their provider error codes

use keyvault_core::Error as CoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("No active {0}")]
    NoActiveSession(&'static str),
}

pub type BridgeResult<T> = std::result::Result<T, BridgeError>;

/// Error object returned to the dapp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl BridgeError {
    /// EIP-1193 / JSON-RPC error code
    pub fn code(&self) -> i64 {
        match self {
            BridgeError::Core(e) => match e {
                CoreError::UserRejected => 4001,
                CoreError::Unauthorized(_) => 4100,
                CoreError::NotSupported(_) => 4200,
                CoreError::NetworkMismatch { .. } => 4901,
                CoreError::InvalidInput(_) | CoreError::InvalidAddress(_) => -32602,
                CoreError::Network(_) | CoreError::Timeout(_) => -32000,
                _ => -32603,
            },
            BridgeError::MethodNotFound(_) => -32601,
            BridgeError::InvalidParams(_) => -32602,
            BridgeError::NoActiveSession(_) => 4100,
        }
    }

    pub fn to_rpc_error(&self) -> RpcError {
        RpcError {
            code: self.code(),
            message: self.to_string(),
        }
    }
}
