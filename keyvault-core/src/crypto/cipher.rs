//! Password-based encryption for secrets at rest
//!
//! PBKDF2-HMAC-SHA256 stretches the password into an AES-256-GCM key. A
//! wrong password fails the GCM tag check, so decryption either returns the
//! complete plaintext or nothing.

use std::fmt;

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{CredentialError, Error, Result};

pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;
const SALT_LENGTH: usize = 16;
const NONCE_LENGTH: usize = 12;

/// A user password. Wiped on drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Password(String);

impl Password {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Password {
    fn from(password: &str) -> Self {
        Self::new(password)
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

/// Ciphertext plus everything needed to decrypt it given the password
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedSecret {
    pub salt: Vec<u8>,
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub iterations: u32,
}

/// Encrypts and decrypts secrets under a password
#[derive(Debug, Clone, Copy)]
pub struct CredentialCipher {
    iterations: u32,
}

impl Default for CredentialCipher {
    fn default() -> Self {
        Self::new(DEFAULT_KDF_ITERATIONS)
    }
}

impl CredentialCipher {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn encrypt(&self, plaintext: &[u8], password: &Password) -> Result<EncryptedSecret> {
        let mut salt = vec![0u8; SALT_LENGTH];
        OsRng.fill_bytes(&mut salt);

        let cipher = build_cipher(password, &salt, self.iterations)?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| CredentialError::Corrupted(format!("encryption failed: {}", e)))?;

        Ok(EncryptedSecret {
            salt,
            nonce: nonce.to_vec(),
            ciphertext,
            iterations: self.iterations,
        })
    }

    /// Decrypt using the parameters recorded in the secret itself
    pub fn decrypt(&self, secret: &EncryptedSecret, password: &Password) -> Result<Zeroizing<Vec<u8>>> {
        if secret.nonce.len() != NONCE_LENGTH || secret.salt.len() != SALT_LENGTH {
            return Err(CredentialError::Corrupted("invalid salt or nonce length".to_string()).into());
        }

        let cipher = build_cipher(password, &secret.salt, secret.iterations)?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&secret.nonce), secret.ciphertext.as_ref())
            .map_err(|_| Error::Credential(CredentialError::WrongPassword))?;

        Ok(Zeroizing::new(plaintext))
    }
}

fn build_cipher(password: &Password, salt: &[u8], iterations: u32) -> Result<Aes256Gcm> {
    let mut key = Zeroizing::new([0u8; 32]);
    pbkdf2_hmac::<Sha256>(password.as_str().as_bytes(), salt, iterations, &mut key[..]);

    Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| CredentialError::Corrupted(format!("invalid key: {}", e)).into())
}
