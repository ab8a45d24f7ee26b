//! Common transaction types

use serde::{Deserialize, Serialize};

/// A native-asset transfer as requested by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferInfo {
    /// From address
    pub from: String,
    /// To address
    pub to: String,
    /// Amount in the smallest unit (wei, lamports, microalgos)
    pub amount: u128,
    /// Optional note attached to the transfer
    #[serde(default)]
    pub memo: Option<String>,
}

/// Fee parameters in the smallest unit of the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeeInfo {
    /// Gas limit on EVM; unused elsewhere
    pub limit: u64,
    /// Gas price on EVM, flat fee on Algorand; Solana derives the fee itself
    pub price: u128,
}

/// Chain state a transaction is bound to, fetched right before building
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "impl", rename_all = "lowercase")]
pub enum TxContext {
    Evm {
        chain_id: u64,
        nonce: u64,
    },
    Sol {
        /// Base58 encoded recent blockhash
        recent_blockhash: String,
    },
    Algo {
        genesis_id: String,
        /// Base64 encoded genesis hash
        genesis_hash: String,
        first_valid: u64,
        last_valid: u64,
    },
}

impl TxContext {
    /// Network impl this context belongs to
    pub fn network_impl(&self) -> &'static str {
        match self {
            TxContext::Evm { .. } => "evm",
            TxContext::Sol { .. } => "sol",
            TxContext::Algo { .. } => "algo",
        }
    }
}

/// A fully specified transaction that has not been signed yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTx {
    pub from: String,
    pub to: String,
    pub value: u128,
    pub fee: FeeInfo,
    pub memo: Option<String>,
    pub context: TxContext,
}

/// A signed transaction ready for broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTx {
    /// Transaction hash / id in the chain's native notation
    pub txid: String,
    /// Wire encoding: `0x` hex on EVM, base58 on Solana, base64 on Algorand
    pub raw_tx: String,
    /// Hex encoded signature bytes
    pub signature: String,
}
