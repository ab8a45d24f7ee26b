//! Cryptographic primitives and operations
//!
//! Mnemonic handling, curve-level key derivation and the password-based
//! cipher that protects credentials at rest.

pub mod cipher;
pub mod keys;
pub mod mnemonic;

pub use keys::*;
pub use mnemonic::*;
