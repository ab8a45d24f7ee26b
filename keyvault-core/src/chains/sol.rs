//! Solana

use async_trait::async_trait;
use solana_sdk::{
    hash::Hash,
    message::Message,
    pubkey::Pubkey,
    signature::Signature,
    system_instruction,
    transaction::Transaction,
};

use crate::crypto::keys::{Curve, PublicKey};
use crate::error::{Error, Result};
use crate::signer::TxSigner;
use crate::transaction::{SignedTx, TxContext, UnsignedTx};
use super::{ensure_curve, ChainImpl, ChainPlugin, VaultSettings};

pub const COIN_TYPE: u32 = 501;

/// Solana: ed25519 keys, base58 addresses, legacy messages carrying a
/// single system transfer
pub struct SolPlugin;

fn decode_key(address: &str) -> Result<[u8; 32]> {
    let bytes = bs58::decode(address)
        .into_vec()
        .map_err(|e| Error::InvalidAddress(format!("{}: {}", address, e)))?;

    bytes
        .try_into()
        .map_err(|_| Error::InvalidAddress(format!("{}: expected 32 bytes", address)))
}

/// Legacy message transferring `lamports` from `from` to `to`, paid by `from`
fn transfer_message(from: [u8; 32], to: [u8; 32], lamports: u64, recent_blockhash: [u8; 32]) -> Message {
    let from = Pubkey::new_from_array(from);
    let to = Pubkey::new_from_array(to);
    let instruction = system_instruction::transfer(&from, &to, lamports);

    Message::new_with_blockhash(&[instruction], Some(&from), &Hash::new_from_array(recent_blockhash))
}

#[async_trait]
impl ChainPlugin for SolPlugin {
    fn chain_impl(&self) -> ChainImpl {
        ChainImpl::Sol
    }

    fn curve(&self) -> Curve {
        Curve::Ed25519
    }

    fn coin_type(&self) -> u32 {
        COIN_TYPE
    }

    fn account_name_prefix(&self) -> &'static str {
        "SOL"
    }

    fn path_prefix(&self) -> String {
        format!("m/44'/{}'", COIN_TYPE)
    }

    fn relative_path(&self, index: u32) -> String {
        format!("{}'/0'", index)
    }

    fn settings(&self) -> VaultSettings {
        VaultSettings {
            fee_info_editable: false,
            private_key_export_enabled: true,
            token_enabled: true,
            tx_can_be_replaced: false,
            imported_account_enabled: true,
            hardware_account_enabled: true,
            external_account_enabled: false,
            watching_account_enabled: true,
            is_utxo_model: false,
            cannot_send_to_self: true,
            memo_supported: false,
        }
    }

    fn validate_address(&self, address: &str) -> Result<String> {
        let key = decode_key(address)?;
        let canonical = bs58::encode(key).into_string();
        if canonical != address {
            return Err(Error::InvalidAddress(address.to_string()));
        }
        Ok(canonical)
    }

    fn address_from_public_key(&self, public_key: &PublicKey) -> Result<String> {
        if public_key.as_bytes().len() != 32 {
            return Err(Error::Derivation("Solana public keys are 32 bytes".to_string()));
        }
        Ok(bs58::encode(public_key.as_bytes()).into_string())
    }

    fn public_key_from_address(&self, address: &str) -> Option<String> {
        decode_key(address).ok().map(hex::encode)
    }

    async fn sign_transaction(&self, unsigned: &UnsignedTx, signer: &dyn TxSigner) -> Result<SignedTx> {
        ensure_curve(self, signer)?;
        let recent_blockhash = match &unsigned.context {
            TxContext::Sol { recent_blockhash } => decode_key(recent_blockhash)
                .map_err(|_| Error::Signing(format!("Invalid recent blockhash: {}", recent_blockhash)))?,
            other => {
                return Err(Error::Signing(format!("Expected a sol context, got {}", other.network_impl())))
            }
        };
        let lamports = u64::try_from(unsigned.value)
            .map_err(|_| Error::Signing(format!("Amount out of range: {}", unsigned.value)))?;

        let from = decode_key(&unsigned.from)?;
        let to = decode_key(&unsigned.to)?;
        let message = transfer_message(from, to, lamports, recent_blockhash);

        let signature = signer.sign(&message.serialize()).await?;

        let mut transaction = Transaction::new_unsigned(message);
        transaction.signatures = vec![Signature::from(signature.bytes)];
        let wire = bincode::serialize(&transaction)
            .map_err(|e| Error::Serialization(format!("Solana transaction: {}", e)))?;

        Ok(SignedTx {
            txid: bs58::encode(signature.bytes).into_string(),
            raw_tx: bs58::encode(wire).into_string(),
            signature: hex::encode(signature.bytes),
        })
    }

    /// Raw ed25519 over the UTF-8 message, base58 encoded
    async fn sign_message(&self, message: &str, signer: &dyn TxSigner) -> Result<String> {
        ensure_curve(self, signer)?;
        let signature = signer.sign(message.as_bytes()).await?;
        Ok(bs58::encode(signature.bytes).into_string())
    }
}
