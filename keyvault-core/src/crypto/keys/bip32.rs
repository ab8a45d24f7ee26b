//! BIP-32 derivation and signing on secp256k1

use hmac::{Hmac, Mac};
use secp256k1::{ecdsa::RecoverableSignature, Message, PublicKey as Secp256k1PublicKey, Scalar, Secp256k1, SecretKey};
use sha2::Sha512;

use crate::error::{Error, Result};
use super::derivation::{ExtendedKey, RawSignature, HARDENED_OFFSET};

/// Derive the master key from a seed
pub fn master_key(seed: &[u8]) -> Result<ExtendedKey> {
    let (key, chain_code) = hmac_sha512(b"Bitcoin seed", &[seed])?;

    SecretKey::from_slice(&key)
        .map_err(|e| Error::Derivation(format!("Invalid master key: {}", e)))?;

    Ok(ExtendedKey::new(key, chain_code))
}

/// Derive a child key from a parent key
pub fn derive_child(parent: &ExtendedKey, index: u32) -> Result<ExtendedKey> {
    let secp = Secp256k1::new();
    let parent_secret_key = SecretKey::from_slice(parent.key())
        .map_err(|e| Error::Derivation(format!("Invalid parent key: {}", e)))?;

    let index_bytes = index.to_be_bytes();
    let (child_key, child_chain_code) = if index >= HARDENED_OFFSET {
        hmac_sha512(parent.chain_code(), &[&[0u8], parent.key(), &index_bytes])?
    } else {
        let parent_public_key = Secp256k1PublicKey::from_secret_key(&secp, &parent_secret_key);
        hmac_sha512(parent.chain_code(), &[&parent_public_key.serialize(), &index_bytes])?
    };

    // child = IL + parent (mod n)
    let child_secret_key = SecretKey::from_slice(&child_key)
        .map_err(|e| Error::Derivation(format!("Invalid child key: {}", e)))?
        .add_tweak(&Scalar::from(parent_secret_key))
        .map_err(|e| Error::Derivation(format!("Key addition error: {}", e)))?;

    Ok(ExtendedKey::new(child_secret_key.secret_bytes(), child_chain_code))
}

/// Compressed (33 byte) public key for a private key
pub fn public_key(private_key: &[u8; 32]) -> Result<[u8; 33]> {
    let secp = Secp256k1::new();
    let secret_key = SecretKey::from_slice(private_key)
        .map_err(|e| Error::Derivation(format!("Invalid secret key: {}", e)))?;

    Ok(Secp256k1PublicKey::from_secret_key(&secp, &secret_key).serialize())
}

/// Expand a compressed or uncompressed public key to the 65 byte form
pub fn uncompressed(public_key: &[u8]) -> Result<[u8; 65]> {
    let public_key = Secp256k1PublicKey::from_slice(public_key)
        .map_err(|e| Error::Derivation(format!("Invalid secp256k1 public key: {}", e)))?;

    Ok(public_key.serialize_uncompressed())
}

/// Produce a recoverable ECDSA signature over a 32 byte digest
pub fn sign_digest(private_key: &[u8; 32], digest: &[u8]) -> Result<RawSignature> {
    let secp = Secp256k1::new();
    let secret_key = SecretKey::from_slice(private_key)
        .map_err(|e| Error::Signing(format!("Invalid secret key: {}", e)))?;
    let message = Message::from_digest_slice(digest)
        .map_err(|e| Error::Signing(format!("Invalid digest: {}", e)))?;

    let signature: RecoverableSignature = secp.sign_ecdsa_recoverable(&message, &secret_key);
    let (recovery_id, bytes) = signature.serialize_compact();

    Ok(RawSignature {
        bytes,
        recovery_id: Some(recovery_id.to_i32() as u8),
    })
}

fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> Result<([u8; 32], [u8; 32])> {
    let mut hmac = Hmac::<Sha512>::new_from_slice(key)
        .map_err(|_| Error::Derivation("HMAC error".to_string()))?;

    for part in parts {
        hmac.update(part);
    }
    let result = hmac.finalize().into_bytes();

    let mut left = [0u8; 32];
    let mut right = [0u8; 32];
    left.copy_from_slice(&result[0..32]);
    right.copy_from_slice(&result[32..64]);

    Ok((left, right))
}
