//! In-memory credential store

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::crypto::cipher::{CredentialCipher, EncryptedSecret, Password};
use crate::error::{CredentialError, Result};
use super::{Credential, CredentialKind, CredentialStore};

/// Encrypted form of a credential as it sits in the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    pub kind: CredentialKind,
    pub secret: EncryptedSecret,
}

/// Credential store keeping encrypted credentials in a map.
///
/// Only ciphertext is held; plaintext exists only inside `get_credential`'s
/// return value.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    cipher: CredentialCipher,
    credentials: RwLock<HashMap<String, StoredCredential>>,
}

impl InMemoryCredentialStore {
    pub fn new(cipher: CredentialCipher) -> Self {
        Self {
            cipher,
            credentials: RwLock::new(HashMap::new()),
        }
    }

    /// Export the encrypted entries, e.g. for persisting to disk
    pub async fn export(&self) -> HashMap<String, StoredCredential> {
        self.credentials.read().await.clone()
    }

    /// Load previously exported encrypted entries
    pub async fn import(&self, entries: HashMap<String, StoredCredential>) {
        self.credentials.write().await.extend(entries);
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    #[instrument(skip(self, password))]
    async fn get_credential(&self, credential_id: &str, password: &Password) -> Result<Credential> {
        let stored = self
            .credentials
            .read()
            .await
            .get(credential_id)
            .cloned()
            .ok_or_else(|| CredentialError::NotFound(credential_id.to_string()))?;

        let plaintext = self.cipher.decrypt(&stored.secret, password).map_err(|e| {
            warn!(credential_id, "credential decryption failed");
            e
        })?;

        debug!(credential_id, kind = ?stored.kind, "credential decrypted");
        Ok(match stored.kind {
            CredentialKind::Seed => Credential::Seed(plaintext.to_vec()),
            CredentialKind::PrivateKey => Credential::PrivateKey(plaintext.to_vec()),
        })
    }

    #[instrument(skip(self, credential, password))]
    async fn save_credential(&self, credential_id: &str, credential: &Credential, password: &Password) -> Result<()> {
        let secret = self.cipher.encrypt(credential.expose(), password)?;
        let stored = StoredCredential {
            kind: credential.kind(),
            secret,
        };

        self.credentials
            .write()
            .await
            .insert(credential_id.to_string(), stored);

        debug!(credential_id, "credential saved");
        Ok(())
    }

    async fn remove_credential(&self, credential_id: &str) -> Result<bool> {
        Ok(self.credentials.write().await.remove(credential_id).is_some())
    }

    async fn has_credential(&self, credential_id: &str) -> Result<bool> {
        Ok(self.credentials.read().await.contains_key(credential_id))
    }
}
