//! EVM chains

use async_trait::async_trait;
use ethers_core::types::{
    transaction::eip2718::TypedTransaction, Address, Signature, TransactionRequest, U256,
};
use ethers_core::utils::{hash_message, keccak256, to_checksum};

use crate::crypto::keys::{bip32, Curve, PublicKey, RawSignature};
use crate::error::{Error, Result};
use crate::signer::TxSigner;
use crate::transaction::{SignedTx, TxContext, UnsignedTx};
use super::{ensure_curve, ChainImpl, ChainPlugin, VaultSettings};

pub const COIN_TYPE: u32 = 60;

/// Ethereum and compatible chains: secp256k1 keys, keccak addresses, RLP
/// encoded EIP-155 legacy transactions
pub struct EvmPlugin;

impl EvmPlugin {
    fn parse_address(&self, address: &str) -> Result<Address> {
        let normalized = self.validate_address(address)?;
        normalized
            .parse::<Address>()
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", address, e)))
    }
}

#[async_trait]
impl ChainPlugin for EvmPlugin {
    fn chain_impl(&self) -> ChainImpl {
        ChainImpl::Evm
    }

    fn curve(&self) -> Curve {
        Curve::Secp256k1
    }

    fn coin_type(&self) -> u32 {
        COIN_TYPE
    }

    fn account_name_prefix(&self) -> &'static str {
        "EVM"
    }

    fn path_prefix(&self) -> String {
        format!("m/44'/{}'/0'/0", COIN_TYPE)
    }

    fn relative_path(&self, index: u32) -> String {
        index.to_string()
    }

    fn settings(&self) -> VaultSettings {
        VaultSettings {
            fee_info_editable: true,
            private_key_export_enabled: true,
            token_enabled: true,
            tx_can_be_replaced: true,
            imported_account_enabled: true,
            hardware_account_enabled: true,
            external_account_enabled: true,
            watching_account_enabled: true,
            is_utxo_model: false,
            cannot_send_to_self: false,
            memo_supported: false,
        }
    }

    fn max_amount(&self) -> u128 {
        u128::MAX
    }

    /// Accepts all-lowercase, all-uppercase or EIP-55 checksummed hex and
    /// returns the lowercase form
    fn validate_address(&self, address: &str) -> Result<String> {
        let invalid = || Error::InvalidAddress(address.to_string());

        let body = address.strip_prefix("0x").ok_or_else(invalid)?;
        if body.len() != 40 || !body.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let lower = body.to_ascii_lowercase();
        let mixed_case = body != lower && body != body.to_ascii_uppercase();
        if mixed_case {
            let parsed: Address = format!("0x{}", lower).parse().map_err(|_| invalid())?;
            if to_checksum(&parsed, None) != address {
                return Err(invalid());
            }
        }

        Ok(format!("0x{}", lower))
    }

    fn address_from_public_key(&self, public_key: &PublicKey) -> Result<String> {
        let uncompressed = bip32::uncompressed(public_key.as_bytes())?;
        let hash = keccak256(&uncompressed[1..]);
        Ok(format!("0x{}", hex::encode(&hash[12..])))
    }

    fn public_key_from_address(&self, _address: &str) -> Option<String> {
        None
    }

    async fn sign_transaction(&self, unsigned: &UnsignedTx, signer: &dyn TxSigner) -> Result<SignedTx> {
        ensure_curve(self, signer)?;
        let (chain_id, nonce) = match &unsigned.context {
            TxContext::Evm { chain_id, nonce } => (*chain_id, *nonce),
            other => {
                return Err(Error::Signing(format!("Expected an evm context, got {}", other.network_impl())))
            }
        };
        // EIP-155: v = recovery_id + chain_id * 2 + 35
        let v_base = chain_id
            .checked_mul(2)
            .and_then(|v| v.checked_add(35))
            .ok_or_else(|| Error::Signing(format!("Chain id out of range: {}", chain_id)))?;

        let request = TransactionRequest::new()
            .from(self.parse_address(&unsigned.from)?)
            .to(self.parse_address(&unsigned.to)?)
            .value(U256::from(unsigned.value))
            .gas(U256::from(unsigned.fee.limit))
            .gas_price(U256::from(unsigned.fee.price))
            .nonce(nonce)
            .chain_id(chain_id);
        let tx = TypedTransaction::Legacy(request);

        let raw = signer.sign(tx.sighash().as_bytes()).await?;
        let recovery_id = recovery_id(&raw)?;
        let signature = Signature {
            r: U256::from_big_endian(&raw.bytes[..32]),
            s: U256::from_big_endian(&raw.bytes[32..]),
            v: v_base
                .checked_add(recovery_id as u64)
                .ok_or_else(|| Error::Signing(format!("Chain id out of range: {}", chain_id)))?,
        };

        let encoded = tx.rlp_signed(&signature);
        Ok(SignedTx {
            txid: format!("0x{}", hex::encode(keccak256(&encoded))),
            raw_tx: format!("0x{}", hex::encode(&encoded)),
            signature: hex::encode(raw.bytes),
        })
    }

    /// `personal_sign`: a `0x` prefixed hex message is signed as raw bytes,
    /// anything else as UTF-8
    async fn sign_message(&self, message: &str, signer: &dyn TxSigner) -> Result<String> {
        ensure_curve(self, signer)?;
        let bytes = match message.strip_prefix("0x").map(hex::decode) {
            Some(Ok(bytes)) => bytes,
            _ => message.as_bytes().to_vec(),
        };

        let raw = signer.sign(hash_message(bytes).as_bytes()).await?;
        let mut signature = raw.bytes.to_vec();
        signature.push(27 + recovery_id(&raw)?);
        Ok(format!("0x{}", hex::encode(signature)))
    }
}

fn recovery_id(raw: &RawSignature) -> Result<u8> {
    raw.recovery_id
        .ok_or_else(|| Error::Signing("Signature is missing a recovery id".to_string()))
}
