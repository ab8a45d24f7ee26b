//! Error types for the keyvault-core library
//!
//! None of the messages carried here may contain decrypted secret bytes or
//! passwords; every variant is safe to log.

use thiserror::Error;

/// Failures raised while reading or writing encrypted credentials
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Wrong password")]
    WrongPassword,

    #[error("Credential not found: {0}")]
    NotFound(String),

    #[error("Credential corrupted: {0}")]
    Corrupted(String),
}

/// Custom error type for keyvault operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Key derivation error: {0}")]
    Derivation(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Chain/network not matched. method={method} scope={scope} origin={origin}")]
    NetworkMismatch {
        method: String,
        scope: String,
        origin: String,
    },

    #[error("User rejected the request")]
    UserRejected,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Wrong-password failures must surface to the caller and never be retried
    pub fn is_wrong_password(&self) -> bool {
        matches!(self, Error::Credential(CredentialError::WrongPassword))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type for keyvault operations
pub type Result<T> = std::result::Result<T, Error>;
