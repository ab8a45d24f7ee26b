//! Common key derivation functionality

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{Error, Result};
use super::{bip32, slip10};

/// Offset applied to hardened child indexes
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Supported signing curves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Curve {
    /// EVM chains, Tron, Bitcoin
    Secp256k1,
    /// Solana, Algorand
    Ed25519,
}

impl Curve {
    pub fn as_str(&self) -> &'static str {
        match self {
            Curve::Secp256k1 => "secp256k1",
            Curve::Ed25519 => "ed25519",
        }
    }

    /// Derive the master node for this curve from a BIP-39 seed
    pub fn master_key(&self, seed: &[u8]) -> Result<ExtendedKey> {
        match self {
            Curve::Secp256k1 => bip32::master_key(seed),
            Curve::Ed25519 => slip10::master_key(seed),
        }
    }

    /// Derive one child node
    pub fn derive_child(&self, parent: &ExtendedKey, index: u32) -> Result<ExtendedKey> {
        match self {
            Curve::Secp256k1 => bip32::derive_child(parent, index),
            Curve::Ed25519 => slip10::derive_child(parent, index),
        }
    }

    /// Walk a full path starting at `node`
    pub fn derive_from(&self, node: &ExtendedKey, path: &[u32]) -> Result<ExtendedKey> {
        let mut current = node.clone();
        for index in path {
            current = self.derive_child(&current, *index)?;
        }
        Ok(current)
    }

    /// Public key bytes for a private key: compressed SEC1 for secp256k1,
    /// raw 32 bytes for ed25519
    pub fn public_key(&self, private_key: &[u8; 32]) -> Result<Vec<u8>> {
        match self {
            Curve::Secp256k1 => bip32::public_key(private_key).map(|k| k.to_vec()),
            Curve::Ed25519 => Ok(slip10::public_key(private_key).to_vec()),
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed BIP-32 style derivation path (`m/44'/60'/0'/0/0`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationPath {
    components: Vec<u32>,
}

impl DerivationPath {
    pub fn components(&self) -> &[u32] {
        &self.components
    }

    /// Parse a path relative to some parent node (`0'/0'` or `5`)
    pub fn parse_relative(path: &str) -> Result<Vec<u32>> {
        path.split('/')
            .filter(|component| !component.is_empty())
            .map(parse_component)
            .collect()
    }
}

impl FromStr for DerivationPath {
    type Err = Error;

    fn from_str(path: &str) -> Result<Self> {
        let rest = path
            .strip_prefix("m/")
            .or_else(|| if path == "m" { Some("") } else { None })
            .ok_or_else(|| Error::Derivation(format!("Invalid derivation path: {}", path)))?;

        Ok(Self {
            components: Self::parse_relative(rest)?,
        })
    }
}

fn parse_component(component: &str) -> Result<u32> {
    let invalid = || Error::Derivation(format!("Invalid derivation path component: {}", component));

    match component.strip_suffix('\'') {
        Some(index) => {
            let index = index.parse::<u32>().map_err(|_| invalid())?;
            if index >= HARDENED_OFFSET {
                return Err(invalid());
            }
            Ok(HARDENED_OFFSET + index)
        }
        None => {
            let index = component.parse::<u32>().map_err(|_| invalid())?;
            if index >= HARDENED_OFFSET {
                return Err(invalid());
            }
            Ok(index)
        }
    }
}

/// A derived node: private key plus chain code. Zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ExtendedKey {
    key: [u8; 32],
    chain_code: [u8; 32],
}

impl ExtendedKey {
    pub(crate) fn new(key: [u8; 32], chain_code: [u8; 32]) -> Self {
        Self { key, chain_code }
    }

    pub(crate) fn key(&self) -> &[u8; 32] {
        &self.key
    }

    pub(crate) fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    /// Copy the private key out into a buffer that is wiped on drop
    pub fn private_key(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.key)
    }
}

impl fmt::Debug for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ExtendedKey(<redacted>)")
    }
}

/// A private key bound to a curve. Zeroed on drop, never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey {
    bytes: [u8; 32],
    #[zeroize(skip)]
    curve: Curve,
}

impl PrivateKey {
    pub fn new(bytes: [u8; 32], curve: Curve) -> Self {
        Self { bytes, curve }
    }

    /// Build from a slice, rejecting anything but 32 bytes
    pub fn from_slice(bytes: &[u8], curve: Curve) -> Result<Self> {
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::Derivation(format!("Invalid {} private key length", curve)))?;
        Ok(Self::new(bytes, curve))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    pub fn curve(&self) -> Curve {
        self.curve
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        Ok(PublicKey::new(self.curve.public_key(&self.bytes)?, self.curve))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({}, <redacted>)", self.curve)
    }
}

/// A public key for a specific curve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    bytes: Vec<u8>,
    curve: Curve,
}

impl PublicKey {
    pub fn new(bytes: Vec<u8>, curve: Curve) -> Self {
        Self { bytes, curve }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn curve(&self) -> Curve {
        self.curve
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

/// A signature produced by a signer. `recovery_id` is only set for
/// recoverable secp256k1 signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSignature {
    pub bytes: [u8; 64],
    pub recovery_id: Option<u8>,
}

/// Public key derived at a concrete path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyInfo {
    pub path: String,
    pub public_key: PublicKey,
}

/// Derive public keys for several children of `prefix` from one seed.
///
/// The prefix node is derived once; every relative path is walked from it.
pub fn batch_get_public_keys(
    curve: Curve,
    seed: &[u8],
    prefix: &str,
    relative_paths: &[String],
) -> Result<Vec<PublicKeyInfo>> {
    let prefix_path: DerivationPath = prefix.parse()?;
    let master = curve.master_key(seed)?;
    let parent = curve.derive_from(&master, prefix_path.components())?;

    relative_paths
        .iter()
        .map(|relative| {
            let components = DerivationPath::parse_relative(relative)?;
            let node = curve.derive_from(&parent, &components)?;
            let public_key = curve.public_key(node.key())?;
            Ok(PublicKeyInfo {
                path: format!("{}/{}", prefix.trim_end_matches('/'), relative),
                public_key: PublicKey::new(public_key, curve),
            })
        })
        .collect()
}

/// Derive the private keys at the given absolute paths
pub fn batch_get_private_keys(
    curve: Curve,
    seed: &[u8],
    paths: &[String],
) -> Result<Vec<(String, PrivateKey)>> {
    let master = curve.master_key(seed)?;

    paths
        .iter()
        .map(|path| {
            let parsed: DerivationPath = path.parse()?;
            let node = curve.derive_from(&master, parsed.components())?;
            Ok((path.clone(), PrivateKey::new(*node.key(), curve)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_derivation_path() {
        let path: DerivationPath = "m/44'/60'/0'/0/3".parse().unwrap();
        assert_eq!(
            path.components(),
            &[HARDENED_OFFSET + 44, HARDENED_OFFSET + 60, HARDENED_OFFSET, 0, 3]
        );

        assert!("44'/60'".parse::<DerivationPath>().is_err());
        assert!("m/44'/x".parse::<DerivationPath>().is_err());
        assert!("m/2147483648".parse::<DerivationPath>().is_err());
    }

    #[test]
    fn test_private_key_debug_is_redacted() {
        let key = PrivateKey::new([7u8; 32], Curve::Ed25519);
        let printed = format!("{:?}", key);
        assert!(!printed.contains("07"));
        assert!(printed.contains("redacted"));
    }

    #[test]
    fn test_batch_public_keys_match_private_keys() {
        let seed = [3u8; 64];
        let relative = vec!["0'".to_string(), "1'".to_string()];
        let infos = batch_get_public_keys(Curve::Ed25519, &seed, "m/44'/283'/0'/0'", &relative).unwrap();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[1].path, "m/44'/283'/0'/0'/1'");

        let paths: Vec<String> = infos.iter().map(|i| i.path.clone()).collect();
        let private_keys = batch_get_private_keys(Curve::Ed25519, &seed, &paths).unwrap();
        for (info, (_, key)) in infos.iter().zip(private_keys.iter()) {
            assert_eq!(key.public_key().unwrap(), info.public_key);
        }
    }
}
