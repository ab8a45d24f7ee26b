//! Transaction functionality
//!
//! Chain-neutral transaction types and the client seam used to fetch chain
//! state and broadcast signed transactions.

pub mod types;
pub mod provider;

pub use types::*;
pub use provider::*;
