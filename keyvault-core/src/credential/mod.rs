//! Credential store
//!
//! Seeds and imported private keys live here encrypted under the user's
//! password. Callers only ever receive a decrypted [`Credential`] for the
//! duration of one operation; it is wiped when dropped.

mod memory;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::cipher::Password;
use crate::error::Result;

pub use memory::InMemoryCredentialStore;

/// What kind of secret a credential holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    Seed,
    PrivateKey,
}

/// A decrypted secret. Zeroed on drop, never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub enum Credential {
    /// BIP-39 seed of an HD wallet
    Seed(Vec<u8>),
    /// Raw private key of an imported account
    PrivateKey(Vec<u8>),
}

impl Credential {
    pub fn kind(&self) -> CredentialKind {
        match self {
            Credential::Seed(_) => CredentialKind::Seed,
            Credential::PrivateKey(_) => CredentialKind::PrivateKey,
        }
    }

    pub(crate) fn expose(&self) -> &[u8] {
        match self {
            Credential::Seed(bytes) | Credential::PrivateKey(bytes) => bytes,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({:?}, <redacted>)", self.kind())
    }
}

/// Password-gated access to encrypted credentials.
///
/// `get_credential` fails with `CredentialError::WrongPassword` on a bad
/// password and never returns partially decrypted bytes.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Decrypt the credential stored under `credential_id`
    async fn get_credential(&self, credential_id: &str, password: &Password) -> Result<Credential>;

    /// Encrypt and store a credential, replacing any previous one
    async fn save_credential(&self, credential_id: &str, credential: &Credential, password: &Password) -> Result<()>;

    /// Drop a credential. Returns whether anything was removed.
    async fn remove_credential(&self, credential_id: &str) -> Result<bool>;

    /// Check whether a credential exists without decrypting it
    async fn has_credential(&self, credential_id: &str) -> Result<bool>;
}
