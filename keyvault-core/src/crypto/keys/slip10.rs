//! SLIP-10 derivation and signing on ed25519

use ed25519_dalek::{Signer as _, SigningKey};
use hmac::{Hmac, Mac};
use sha2::Sha512;

use crate::error::{Error, Result};
use super::derivation::{ExtendedKey, RawSignature, HARDENED_OFFSET};

/// Derive the master key from a seed
pub fn master_key(seed: &[u8]) -> Result<ExtendedKey> {
    let mut hmac = Hmac::<Sha512>::new_from_slice(b"ed25519 seed")
        .map_err(|_| Error::Derivation("HMAC error".to_string()))?;
    hmac.update(seed);

    Ok(split(&hmac.finalize().into_bytes()))
}

/// Derive a child key from a parent key. ed25519 only supports hardened
/// children.
pub fn derive_child(parent: &ExtendedKey, index: u32) -> Result<ExtendedKey> {
    if index < HARDENED_OFFSET {
        return Err(Error::Derivation(format!(
            "ed25519 derivation requires hardened indexes, got {}",
            index
        )));
    }

    let mut hmac = Hmac::<Sha512>::new_from_slice(parent.chain_code())
        .map_err(|_| Error::Derivation("HMAC error".to_string()))?;
    hmac.update(&[0u8]);
    hmac.update(parent.key());
    hmac.update(&index.to_be_bytes());

    Ok(split(&hmac.finalize().into_bytes()))
}

/// Raw 32 byte public key
pub fn public_key(private_key: &[u8; 32]) -> [u8; 32] {
    SigningKey::from_bytes(private_key).verifying_key().to_bytes()
}

/// Sign an arbitrary message
pub fn sign(private_key: &[u8; 32], message: &[u8]) -> RawSignature {
    let signature = SigningKey::from_bytes(private_key).sign(message);

    RawSignature {
        bytes: signature.to_bytes(),
        recovery_id: None,
    }
}

fn split(result: &[u8]) -> ExtendedKey {
    let mut key = [0u8; 32];
    let mut chain_code = [0u8; 32];
    key.copy_from_slice(&result[0..32]);
    chain_code.copy_from_slice(&result[32..64]);
    ExtendedKey::new(key, chain_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    // SLIP-10 ed25519 test vector 1
    const SEED: &str = "000102030405060708090a0b0c0d0e0f";

    #[test]
    fn test_master_key_vector() {
        let seed = hex::decode(SEED).unwrap();
        let master = master_key(&seed).unwrap();
        assert_eq!(
            hex::encode(master.key()),
            "2b4be7f19ee27bbf30c667b642d5f4aa69fd169872f8fc3059c08ebae2eb19e7"
        );
        assert_eq!(
            hex::encode(public_key(master.key())),
            "a4b2856bfec510abab89753fac1ac0e1112364e7d250545963f135f2a33188ed"
        );
    }

    #[test]
    fn test_non_hardened_child_rejected() {
        let master = master_key(&[1u8; 32]).unwrap();
        assert!(derive_child(&master, 0).is_err());
        assert!(derive_child(&master, HARDENED_OFFSET).is_ok());
    }
}
