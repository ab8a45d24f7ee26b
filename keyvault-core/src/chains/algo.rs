//! Algorand

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha512_256};

use crate::crypto::keys::{Curve, PublicKey};
use crate::error::{Error, Result};
use crate::signer::TxSigner;
use crate::transaction::{SignedTx, TxContext, UnsignedTx};
use super::{ensure_curve, ChainImpl, ChainPlugin, VaultSettings};

pub const COIN_TYPE: u32 = 283;

/// Minimum flat fee in microalgos
pub const MIN_FEE: u64 = 1_000;

const ADDRESS_LENGTH: usize = 58;
const CHECKSUM_LENGTH: usize = 4;
const MAX_NOTE_LENGTH: usize = 1_024;

const ALPHABET: base32::Alphabet = base32::Alphabet::RFC4648 { padding: false };

/// Algorand: ed25519 keys, base32 addresses with a 4 byte checksum,
/// canonical msgpack payment transactions
pub struct AlgoPlugin;

fn checksum(public_key: &[u8]) -> [u8; CHECKSUM_LENGTH] {
    let digest = Sha512_256::digest(public_key);
    let mut out = [0u8; CHECKSUM_LENGTH];
    out.copy_from_slice(&digest[digest.len() - CHECKSUM_LENGTH..]);
    out
}

fn encode_address(public_key: &[u8; 32]) -> String {
    let mut bytes = public_key.to_vec();
    bytes.extend_from_slice(&checksum(public_key));
    base32::encode(ALPHABET, &bytes)
}

fn decode_address(address: &str) -> Result<[u8; 32]> {
    let invalid = || Error::InvalidAddress(address.to_string());

    if address.len() != ADDRESS_LENGTH {
        return Err(invalid());
    }
    let bytes = base32::decode(ALPHABET, address).ok_or_else(invalid)?;
    if bytes.len() != 32 + CHECKSUM_LENGTH {
        return Err(invalid());
    }

    let (key, sum) = bytes.split_at(32);
    if sum != checksum(key).as_slice() {
        return Err(invalid());
    }
    key.try_into().map_err(|_| invalid())
}

/// Lengths past the 16-bit forms are never needed for a payment
fn length_u16(len: usize) -> Result<u16> {
    u16::try_from(len).map_err(|_| Error::Serialization(format!("Msgpack value of {} bytes is too long", len)))
}

/// Just enough msgpack for canonical transaction encoding: string keys,
/// unsigned ints, strings, binary and pre-encoded values
struct MsgPack {
    buf: Vec<u8>,
}

impl MsgPack {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn map(&mut self, len: usize) -> Result<()> {
        if len < 16 {
            self.buf.push(0x80 | len as u8);
        } else {
            self.buf.push(0xde);
            self.buf.extend_from_slice(&length_u16(len)?.to_be_bytes());
        }
        Ok(())
    }

    fn str(&mut self, value: &str) -> Result<()> {
        let len = value.len();
        if len < 32 {
            self.buf.push(0xa0 | len as u8);
        } else if len <= u8::MAX as usize {
            self.buf.push(0xd9);
            self.buf.push(len as u8);
        } else {
            self.buf.push(0xda);
            self.buf.extend_from_slice(&length_u16(len)?.to_be_bytes());
        }
        self.buf.extend_from_slice(value.as_bytes());
        Ok(())
    }

    fn bin(&mut self, value: &[u8]) -> Result<()> {
        let len = value.len();
        if len <= u8::MAX as usize {
            self.buf.push(0xc4);
            self.buf.push(len as u8);
        } else {
            self.buf.push(0xc5);
            self.buf.extend_from_slice(&length_u16(len)?.to_be_bytes());
        }
        self.buf.extend_from_slice(value);
        Ok(())
    }

    fn uint(&mut self, value: u64) {
        if value < 0x80 {
            self.buf.push(value as u8);
        } else if value <= u8::MAX as u64 {
            self.buf.push(0xcc);
            self.buf.push(value as u8);
        } else if value <= u16::MAX as u64 {
            self.buf.push(0xcd);
            self.buf.extend_from_slice(&(value as u16).to_be_bytes());
        } else if value <= u32::MAX as u64 {
            self.buf.push(0xce);
            self.buf.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            self.buf.push(0xcf);
            self.buf.extend_from_slice(&value.to_be_bytes());
        }
    }

    fn raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }
}

enum Field<'a> {
    Uint(u64),
    Str(&'a str),
    Bin(&'a [u8]),
}

/// A payment transaction in canonical form: keys sorted, empty values left out
struct Payment<'a> {
    sender: [u8; 32],
    receiver: [u8; 32],
    amount: u64,
    fee: u64,
    first_valid: u64,
    last_valid: u64,
    genesis_id: &'a str,
    genesis_hash: Vec<u8>,
    note: &'a [u8],
}

impl Payment<'_> {
    fn encode(&self) -> Result<Vec<u8>> {
        let fields = [
            ("amt", Field::Uint(self.amount)),
            ("fee", Field::Uint(self.fee)),
            ("fv", Field::Uint(self.first_valid)),
            ("gen", Field::Str(self.genesis_id)),
            ("gh", Field::Bin(&self.genesis_hash)),
            ("lv", Field::Uint(self.last_valid)),
            ("note", Field::Bin(self.note)),
            ("rcv", Field::Bin(&self.receiver)),
            ("snd", Field::Bin(&self.sender)),
            ("type", Field::Str("pay")),
        ];
        let present: Vec<_> = fields
            .iter()
            .filter(|(_, value)| match value {
                Field::Uint(v) => *v != 0,
                Field::Str(v) => !v.is_empty(),
                Field::Bin(v) => !v.is_empty(),
            })
            .collect();

        let mut out = MsgPack::new();
        out.map(present.len())?;
        for (key, value) in present {
            out.str(key)?;
            match value {
                Field::Uint(v) => out.uint(*v),
                Field::Str(v) => out.str(v)?,
                Field::Bin(v) => out.bin(v)?,
            }
        }
        Ok(out.finish())
    }
}

fn tx_id(encoded: &[u8]) -> String {
    let mut hasher = Sha512_256::new();
    hasher.update(b"TX");
    hasher.update(encoded);
    base32::encode(ALPHABET, &hasher.finalize())
}

#[async_trait]
impl ChainPlugin for AlgoPlugin {
    fn chain_impl(&self) -> ChainImpl {
        ChainImpl::Algo
    }

    fn curve(&self) -> Curve {
        Curve::Ed25519
    }

    fn coin_type(&self) -> u32 {
        COIN_TYPE
    }

    fn account_name_prefix(&self) -> &'static str {
        "ALGO"
    }

    fn path_prefix(&self) -> String {
        format!("m/44'/{}'/0'/0'", COIN_TYPE)
    }

    fn relative_path(&self, index: u32) -> String {
        format!("{}'", index)
    }

    fn settings(&self) -> VaultSettings {
        VaultSettings {
            fee_info_editable: false,
            private_key_export_enabled: true,
            token_enabled: true,
            tx_can_be_replaced: false,
            imported_account_enabled: true,
            hardware_account_enabled: false,
            external_account_enabled: false,
            watching_account_enabled: true,
            is_utxo_model: false,
            cannot_send_to_self: false,
            memo_supported: true,
        }
    }

    fn validate_address(&self, address: &str) -> Result<String> {
        Ok(encode_address(&decode_address(address)?))
    }

    fn address_from_public_key(&self, public_key: &PublicKey) -> Result<String> {
        let key: [u8; 32] = public_key
            .as_bytes()
            .try_into()
            .map_err(|_| Error::Derivation("Algorand public keys are 32 bytes".to_string()))?;
        Ok(encode_address(&key))
    }

    fn public_key_from_address(&self, address: &str) -> Option<String> {
        decode_address(address).ok().map(hex::encode)
    }

    async fn sign_transaction(&self, unsigned: &UnsignedTx, signer: &dyn TxSigner) -> Result<SignedTx> {
        ensure_curve(self, signer)?;
        let (genesis_id, genesis_hash, first_valid, last_valid) = match &unsigned.context {
            TxContext::Algo {
                genesis_id,
                genesis_hash,
                first_valid,
                last_valid,
            } => (genesis_id, genesis_hash, *first_valid, *last_valid),
            other => {
                return Err(Error::Signing(format!("Expected an algo context, got {}", other.network_impl())))
            }
        };

        let genesis_hash = STANDARD
            .decode(genesis_hash)
            .map_err(|e| Error::Signing(format!("Invalid genesis hash: {}", e)))?;
        if genesis_hash.len() != 32 {
            return Err(Error::Signing("Genesis hash must be 32 bytes".to_string()));
        }
        if last_valid < first_valid {
            return Err(Error::Signing(format!(
                "Invalid validity window {}..{}",
                first_valid, last_valid
            )));
        }

        let note = unsigned.memo.as_deref().unwrap_or_default().as_bytes();
        if note.len() > MAX_NOTE_LENGTH {
            return Err(Error::Signing(format!("Note exceeds {} bytes", MAX_NOTE_LENGTH)));
        }
        let amount = u64::try_from(unsigned.value)
            .map_err(|_| Error::Signing(format!("Amount out of range: {}", unsigned.value)))?;
        let fee = u64::try_from(unsigned.fee.price)
            .map_err(|_| Error::Signing(format!("Fee out of range: {}", unsigned.fee.price)))?
            .max(MIN_FEE);

        let payment = Payment {
            sender: decode_address(&unsigned.from)?,
            receiver: decode_address(&unsigned.to)?,
            amount,
            fee,
            first_valid,
            last_valid,
            genesis_id,
            genesis_hash,
            note,
        };
        let encoded = payment.encode()?;

        let mut prefixed = b"TX".to_vec();
        prefixed.extend_from_slice(&encoded);
        let signature = signer.sign(&prefixed).await?;

        let mut signed = MsgPack::new();
        signed.map(2)?;
        signed.str("sig")?;
        signed.bin(&signature.bytes)?;
        signed.str("txn")?;
        signed.raw(&encoded);

        Ok(SignedTx {
            txid: tx_id(&encoded),
            raw_tx: STANDARD.encode(signed.finish()),
            signature: hex::encode(signature.bytes),
        })
    }

    /// ed25519 over `MX` + message, base64 encoded
    async fn sign_message(&self, message: &str, signer: &dyn TxSigner) -> Result<String> {
        ensure_curve(self, signer)?;
        let mut prefixed = b"MX".to_vec();
        prefixed.extend_from_slice(message.as_bytes());
        let signature = signer.sign(&prefixed).await?;
        Ok(STANDARD.encode(signature.bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::PrivateKey;
    use crate::signer::Signer;
    use crate::transaction::FeeInfo;
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    const ZERO_ADDRESS: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAY5HFKQ";

    fn signer_from(byte: u8) -> Signer {
        Signer::new(PrivateKey::new([byte; 32], Curve::Ed25519))
    }

    fn address_of(signer: &Signer) -> String {
        AlgoPlugin.address_from_public_key(&signer.public_key().unwrap()).unwrap()
    }

    fn context() -> TxContext {
        TxContext::Algo {
            genesis_id: "testnet-v1.0".to_string(),
            genesis_hash: STANDARD.encode([7u8; 32]),
            first_valid: 1_000,
            last_valid: 2_000,
        }
    }

    #[test]
    fn test_zero_address() {
        assert_eq!(encode_address(&[0u8; 32]), ZERO_ADDRESS);
        assert_eq!(decode_address(ZERO_ADDRESS).unwrap(), [0u8; 32]);
    }

    #[test]
    fn test_validate_address() {
        let address = address_of(&signer_from(3));
        assert_eq!(address.len(), ADDRESS_LENGTH);
        assert!(AlgoPlugin.validate_address(&address).is_ok());

        // Corrupt the checksum
        let mut corrupted = address.clone().into_bytes();
        let last = corrupted.len() - 1;
        corrupted[last] = if corrupted[last] == b'A' { b'B' } else { b'A' };
        assert!(AlgoPlugin
            .validate_address(&String::from_utf8(corrupted).unwrap())
            .is_err());
        assert!(AlgoPlugin.validate_address("not-an-address").is_err());
    }

    #[test]
    fn test_payment_encoding_is_sorted_and_sparse() {
        let payment = Payment {
            sender: [1u8; 32],
            receiver: [2u8; 32],
            amount: 0,
            fee: 1_000,
            first_valid: 10,
            last_valid: 20,
            genesis_id: "",
            genesis_hash: vec![7u8; 32],
            note: b"",
        };
        let encoded = payment.encode().unwrap();
        // fee, fv, gh, lv, rcv, snd, type
        assert_eq!(encoded[0], 0x87);
        assert_eq!(&encoded[1..5], b"\xa3fee");
    }

    #[tokio::test]
    async fn test_signed_payment_verifies() {
        let signer = signer_from(3);
        let from = address_of(&signer);
        let unsigned = UnsignedTx {
            from: from.clone(),
            to: ZERO_ADDRESS.to_string(),
            value: 250_000,
            fee: FeeInfo { limit: 0, price: 0 },
            memo: Some("rent".to_string()),
            context: context(),
        };

        let signed = AlgoPlugin.sign_transaction(&unsigned, &signer).await.unwrap();
        let raw = STANDARD.decode(&signed.raw_tx).unwrap();
        assert_eq!(raw[0], 0x82);
        assert_eq!(&raw[1..5], b"\xa3sig");

        // 0xc4 0x40 then the signature, then "txn" and the encoded payment
        let signature = Signature::from_bytes(raw[7..71].try_into().unwrap());
        assert_eq!(&raw[71..75], b"\xa3txn");
        let encoded = &raw[75..];

        let mut prefixed = b"TX".to_vec();
        prefixed.extend_from_slice(encoded);
        let verifying_key = VerifyingKey::from_bytes(&decode_address(&from).unwrap()).unwrap();
        verifying_key.verify(&prefixed, &signature).unwrap();

        assert_eq!(signed.txid, tx_id(encoded));
        assert_eq!(signed.txid.len(), 52);
    }

    #[tokio::test]
    async fn test_message_uses_mx_prefix() {
        let signer = signer_from(3);
        let signature = AlgoPlugin.sign_message("hello", &signer).await.unwrap();
        let bytes = STANDARD.decode(signature).unwrap();

        let verifying_key = VerifyingKey::from_bytes(&decode_address(&address_of(&signer)).unwrap()).unwrap();
        verifying_key
            .verify(b"MXhello", &Signature::from_bytes(bytes.as_slice().try_into().unwrap()))
            .unwrap();
    }

    #[tokio::test]
    async fn test_oversized_genesis_id_is_rejected() {
        let signer = signer_from(3);
        let unsigned = UnsignedTx {
            from: address_of(&signer),
            to: ZERO_ADDRESS.to_string(),
            value: 1,
            fee: FeeInfo::default(),
            memo: None,
            context: TxContext::Algo {
                genesis_id: "g".repeat(70_000),
                genesis_hash: STANDARD.encode([7u8; 32]),
                first_valid: 1_000,
                last_valid: 2_000,
            },
        };
        assert!(matches!(
            AlgoPlugin.sign_transaction(&unsigned, &signer).await,
            Err(Error::Serialization(_))
        ));
    }
}
