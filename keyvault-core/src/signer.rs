//! Signers
//!
//! A [`Signer`] owns one decrypted private key for the duration of a single
//! signing call. It only signs; the key never leaves it and is wiped when the
//! signer is dropped.

use std::fmt;

use async_trait::async_trait;

use crate::crypto::keys::{bip32, slip10, Curve, PrivateKey, PublicKey, RawSignature};
use crate::error::{Error, Result};

/// Anything able to produce signatures for one account: a software signer
/// or a hardware device bound to a derivation path.
///
/// For secp256k1 the payload is a 32-byte digest and the signature is
/// recoverable. For ed25519 the payload is the full message.
#[async_trait]
pub trait TxSigner: Send + Sync {
    fn curve(&self) -> Curve;

    async fn sign(&self, payload: &[u8]) -> Result<RawSignature>;
}

/// Software signer around a decrypted private key
pub struct Signer {
    private_key: PrivateKey,
}

impl Signer {
    pub fn new(private_key: PrivateKey) -> Self {
        Self { private_key }
    }

    pub fn curve(&self) -> Curve {
        self.private_key.curve()
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        self.private_key.public_key()
    }

    /// Sign synchronously; see [`TxSigner`] for the payload rules
    pub fn sign_payload(&self, payload: &[u8]) -> Result<RawSignature> {
        let key = self.private_key.as_bytes();
        match self.curve() {
            Curve::Secp256k1 => {
                if payload.len() != 32 {
                    return Err(Error::Signing(format!(
                        "secp256k1 expects a 32 byte digest, got {} bytes",
                        payload.len()
                    )));
                }
                bip32::sign_digest(key, payload)
            }
            Curve::Ed25519 => Ok(slip10::sign(key, payload)),
        }
    }
}

#[async_trait]
impl TxSigner for Signer {
    fn curve(&self) -> Curve {
        Signer::curve(self)
    }

    async fn sign(&self, payload: &[u8]) -> Result<RawSignature> {
        self.sign_payload(payload)
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signer({}, <redacted>)", self.curve())
    }
}
