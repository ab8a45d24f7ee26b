//! Key derivation and management
//!
//! Hierarchical derivation is grouped by curve rather than by chain: every
//! chain on secp256k1 goes through BIP-32, every chain on ed25519 through
//! SLIP-10. Chains only differ in the derivation path they ask for.

pub mod bip32;
pub mod slip10;
mod derivation;

pub use derivation::*;
