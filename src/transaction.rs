//! Transfer transactions: canonical byte encoding, signing and wire JSON
//!
//! Byte layout (little-endian, 139 bytes, no prefix):
//!
//! | field             | bytes |
//! |-------------------|-------|
//! | type              | 1     |
//! | timestamp         | 4     |
//! | sender public key | 33    |
//! | recipient         | 21    |
//! | vendor field      | 64    |
//! | amount            | 8     |
//! | fee               | 8     |

use crate::config::ApiVersion;
use crate::crypto::{compute_id, decode_address, Address, KeyPair, ADDRESS_LENGTH};
use crate::error::{ClientError, Result};
use secp256k1::constants::PUBLIC_KEY_SIZE;
use serde_json::{json, Value};

pub const TRANSFER_TYPE: u8 = 0;
pub const VENDOR_FIELD_LENGTH: usize = 64;
pub const ENCODED_LENGTH: usize =
    1 + 4 + PUBLIC_KEY_SIZE + ADDRESS_LENGTH + VENDOR_FIELD_LENGTH + 8 + 8;

/// Unsigned transfer. Field values may change freely until `sign`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferBuilder {
    pub timestamp: u32,
    pub recipient: Option<String>,
    pub amount: u64,
    pub fee: u64,
    pub vendor_field: Option<String>,
}

impl TransferBuilder {
    pub fn new(recipient: impl Into<String>, amount: u64, fee: u64, timestamp: u32) -> Self {
        TransferBuilder {
            timestamp,
            recipient: Some(recipient.into()),
            amount,
            fee,
            vendor_field: None,
        }
    }

    pub fn with_vendor_field(mut self, vendor_field: impl Into<String>) -> Result<Self> {
        let vendor_field = vendor_field.into();
        check_vendor_field(&vendor_field)?;
        self.vendor_field = Some(vendor_field);
        Ok(self)
    }

    /// Encodes, hashes and signs in one step, consuming the builder.
    ///
    /// `network` is the expected address version byte of the recipient.
    pub fn sign(self, keypair: &KeyPair, network: Option<u8>) -> Result<SignedTransfer> {
        let recipient = self
            .recipient
            .as_deref()
            .map(|r| decode_address(r, network))
            .transpose()?;
        let sender_public_key = keypair.public_key_bytes();

        let fields = TransferFields {
            timestamp: self.timestamp,
            sender_public_key: &sender_public_key,
            recipient: recipient.as_ref(),
            vendor_field: self.vendor_field.as_deref(),
            amount: self.amount,
            fee: self.fee,
        };
        let bytes = encode(&fields)?;
        let id = compute_id(&bytes);
        let signature = keypair.sign(&bytes);

        Ok(SignedTransfer {
            builder: self,
            sender_public_key,
            bytes,
            signature,
            id,
        })
    }
}

/// Borrowed view of everything that goes into the signed bytes.
#[derive(Debug, Clone, Copy)]
pub struct TransferFields<'a> {
    pub timestamp: u32,
    pub sender_public_key: &'a [u8; PUBLIC_KEY_SIZE],
    pub recipient: Option<&'a Address>,
    pub vendor_field: Option<&'a str>,
    pub amount: u64,
    pub fee: u64,
}

fn check_vendor_field(vendor_field: &str) -> Result<()> {
    let len = vendor_field.len();
    if len > VENDOR_FIELD_LENGTH {
        return Err(ClientError::MemoTooLong { len });
    }
    Ok(())
}

/// Canonical bytes of a transfer. The signature is never part of them.
pub fn encode(fields: &TransferFields<'_>) -> Result<[u8; ENCODED_LENGTH]> {
    let mut out = Vec::with_capacity(ENCODED_LENGTH);

    out.push(TRANSFER_TYPE);
    out.extend_from_slice(&fields.timestamp.to_le_bytes());
    out.extend_from_slice(fields.sender_public_key);

    match fields.recipient {
        Some(address) => out.extend_from_slice(address),
        None => out.extend_from_slice(&[0u8; ADDRESS_LENGTH]),
    }

    let mut vendor = [0u8; VENDOR_FIELD_LENGTH];
    if let Some(text) = fields.vendor_field {
        check_vendor_field(text)?;
        vendor[..text.len()].copy_from_slice(text.as_bytes());
    }
    out.extend_from_slice(&vendor);

    out.extend_from_slice(&fields.amount.to_le_bytes());
    out.extend_from_slice(&fields.fee.to_le_bytes());

    out.try_into().map_err(|out: Vec<u8>| {
        ClientError::Crypto(format!(
            "Encoded transfer is {} bytes, expected {}",
            out.len(),
            ENCODED_LENGTH
        ))
    })
}

/// A signed transfer. Immutable: the bytes, id and signature were produced
/// together and cannot be changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransfer {
    builder: TransferBuilder,
    sender_public_key: [u8; PUBLIC_KEY_SIZE],
    bytes: [u8; ENCODED_LENGTH],
    signature: Vec<u8>,
    id: String,
}

impl SignedTransfer {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bytes(&self) -> &[u8; ENCODED_LENGTH] {
        &self.bytes
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn sender_public_key(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.sender_public_key
    }

    pub fn recipient(&self) -> Option<&str> {
        self.builder.recipient.as_deref()
    }

    pub fn amount(&self) -> u64 {
        self.builder.amount
    }

    pub fn fee(&self) -> u64 {
        self.builder.fee
    }

    pub fn timestamp(&self) -> u32 {
        self.builder.timestamp
    }

    pub fn vendor_field(&self) -> Option<&str> {
        self.builder.vendor_field.as_deref()
    }

    /// JSON body a node expects for this transaction.
    ///
    /// Version 2 nodes additionally want the transaction version and the
    /// network byte, and take amounts as strings.
    pub fn to_json(&self, api_version: ApiVersion, network: u8) -> Value {
        let mut tx = json!({
            "type": TRANSFER_TYPE,
            "timestamp": self.builder.timestamp,
            "recipientId": self.builder.recipient,
            "senderPublicKey": hex::encode(self.sender_public_key),
            "signature": hex::encode(&self.signature),
            "id": self.id,
            "asset": {},
        });

        if let Some(vendor_field) = &self.builder.vendor_field {
            tx["vendorField"] = json!(vendor_field);
        }

        match api_version {
            ApiVersion::V1 => {
                tx["amount"] = json!(self.builder.amount);
                tx["fee"] = json!(self.builder.fee);
            }
            ApiVersion::V2 => {
                tx["amount"] = json!(self.builder.amount.to_string());
                tx["fee"] = json!(self.builder.fee.to_string());
                tx["version"] = json!(1);
                tx["network"] = json!(network);
            }
        }
        tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::verify_signature;

    const PASSPHRASE: &str = "this is a top secret passphrase";

    fn recipient() -> String {
        KeyPair::from_passphrase("recipient").unwrap().address(23)
    }

    fn fields<'a>(key: &'a [u8; 33], recipient: Option<&'a Address>, memo: Option<&'a str>) -> TransferFields<'a> {
        TransferFields {
            timestamp: 0x0102_0304,
            sender_public_key: key,
            recipient,
            vendor_field: memo,
            amount: 100_000_000,
            fee: 10_000_000,
        }
    }

    #[test]
    fn test_encoding_layout() {
        let key = [2u8; 33];
        let address: Address = [23u8; 21];
        let bytes = encode(&fields(&key, Some(&address), Some("hi"))).unwrap();

        assert_eq!(bytes.len(), 139);
        assert_eq!(bytes[0], TRANSFER_TYPE);
        assert_eq!(&bytes[1..5], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&bytes[5..38], &key);
        assert_eq!(&bytes[38..59], &address);
        assert_eq!(&bytes[59..61], b"hi");
        assert!(bytes[61..123].iter().all(|b| *b == 0));
        assert_eq!(&bytes[123..131], &100_000_000u64.to_le_bytes());
        assert_eq!(&bytes[131..139], &10_000_000u64.to_le_bytes());
    }

    #[test]
    fn test_missing_recipient_and_memo_are_zeroed() {
        let key = [3u8; 33];
        let bytes = encode(&fields(&key, None, None)).unwrap();
        assert!(bytes[38..123].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let key = [2u8; 33];
        let address: Address = [9u8; 21];
        let a = encode(&fields(&key, Some(&address), Some("memo"))).unwrap();
        let b = encode(&fields(&key, Some(&address), Some("memo"))).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_memo_padding_strips_back_to_original() {
        let key = [2u8; 33];
        let full = "x".repeat(64);
        let wide = "é".repeat(32);
        for memo in ["", "a", "héllo wörld", full.as_str(), wide.as_str()] {
            let bytes = encode(&fields(&key, None, Some(memo))).unwrap();
            let field = &bytes[59..123];
            let end = field.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
            assert_eq!(&field[..end], memo.as_bytes());
        }
    }

    #[test]
    fn test_memo_too_long_rejected() {
        let key = [2u8; 33];
        let memo = "x".repeat(65);
        assert!(matches!(
            encode(&fields(&key, None, Some(&memo))),
            Err(ClientError::MemoTooLong { len: 65 })
        ));

        // 33 two-byte characters: 33 chars but 66 bytes
        let wide = "é".repeat(33);
        assert!(matches!(
            TransferBuilder::new(recipient(), 1, 1, 1).with_vendor_field(wide),
            Err(ClientError::MemoTooLong { len: 66 })
        ));
    }

    #[test]
    fn test_sign_produces_verifiable_signature_and_id() {
        let keypair = KeyPair::from_passphrase(PASSPHRASE).unwrap();
        let signed = TransferBuilder::new(recipient(), 5, 10_000_000, 1000)
            .with_vendor_field("order 42")
            .unwrap()
            .sign(&keypair, Some(23))
            .unwrap();

        assert_eq!(signed.id(), compute_id(signed.bytes()));
        assert_eq!(signed.id().len(), 64);
        assert!(verify_signature(signed.sender_public_key(), signed.bytes(), signed.signature()).is_ok());
    }

    #[test]
    fn test_id_changes_with_every_field() {
        let keypair = KeyPair::from_passphrase(PASSPHRASE).unwrap();
        let base = TransferBuilder::new(recipient(), 5, 10, 1000)
            .with_vendor_field("a")
            .unwrap();
        let base_id = base.clone().sign(&keypair, Some(23)).unwrap().id().to_string();

        let mut variants = vec![
            TransferBuilder { timestamp: 1001, ..base.clone() },
            TransferBuilder { amount: 6, ..base.clone() },
            TransferBuilder { fee: 11, ..base.clone() },
            TransferBuilder { vendor_field: Some("b".to_string()), ..base.clone() },
            TransferBuilder { vendor_field: None, ..base.clone() },
            TransferBuilder { recipient: None, ..base.clone() },
            TransferBuilder {
                recipient: Some(KeyPair::from_passphrase("someone else").unwrap().address(23)),
                ..base.clone()
            },
        ]
        .into_iter()
        .map(|b| b.sign(&keypair, Some(23)).unwrap().id().to_string())
        .collect::<Vec<_>>();

        let other_sender = KeyPair::from_passphrase("other sender").unwrap();
        variants.push(base.sign(&other_sender, Some(23)).unwrap().id().to_string());

        for id in &variants {
            assert_ne!(id, &base_id);
        }
    }

    #[test]
    fn test_recipient_on_wrong_network_rejected() {
        let keypair = KeyPair::from_passphrase(PASSPHRASE).unwrap();
        let devnet = KeyPair::from_passphrase("recipient").unwrap().address(30);
        let result = TransferBuilder::new(devnet, 1, 1, 1).sign(&keypair, Some(23));
        assert!(matches!(result, Err(ClientError::InvalidAddress(_))));
    }

    #[test]
    fn test_json_shape_per_api_version() {
        let keypair = KeyPair::from_passphrase(PASSPHRASE).unwrap();
        let signed = TransferBuilder::new(recipient(), 5, 10, 1000)
            .sign(&keypair, Some(23))
            .unwrap();

        let v1 = signed.to_json(ApiVersion::V1, 23);
        assert_eq!(v1["type"], 0);
        assert_eq!(v1["amount"], 5);
        assert_eq!(v1["id"], signed.id());
        assert_eq!(v1["signature"], hex::encode(signed.signature()));
        assert!(v1.get("vendorField").is_none());
        assert!(v1.get("network").is_none());

        let v2 = signed.to_json(ApiVersion::V2, 23);
        assert_eq!(v2["amount"], "5");
        assert_eq!(v2["fee"], "10");
        assert_eq!(v2["network"], 23);
        assert_eq!(v2["version"], 1);
    }
}
