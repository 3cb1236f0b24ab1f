//! Cryptographic primitives for the Ark client
//!
//! Keys are secp256k1, derived from a passphrase by a single SHA-256.
//! Addresses are base58check over `version || RIPEMD-160(compressed pubkey)`.

use crate::error::ClientError;
use once_cell::sync::Lazy;
use ripemd::Ripemd160;
use secp256k1::{
    constants::PUBLIC_KEY_SIZE, ecdsa::Signature, All, Message, PublicKey, Secp256k1, SecretKey,
};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

/// A thread-safe, lazily initialized Secp256k1 context.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Length of a decoded address: one version byte plus a 20-byte key hash.
pub const ADDRESS_LENGTH: usize = 21;

/// Decoded address bytes, version byte first.
pub type Address = [u8; ADDRESS_LENGTH];

pub struct KeyPair {
    secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Derives the keypair for a passphrase. Any passphrase, including the
    /// empty one, is accepted.
    pub fn from_passphrase(passphrase: &str) -> Result<Self, ClientError> {
        let mut seed: [u8; 32] = Sha256::digest(passphrase.as_bytes()).into();
        let secret_key = SecretKey::from_slice(&seed);
        seed.zeroize();

        let secret_key = secret_key
            .map_err(|e| ClientError::Crypto(format!("Passphrase yields invalid key: {}", e)))?;
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);

        Ok(KeyPair {
            secret_key,
            public_key,
        })
    }

    /// Returns the KeyPair's public key as a compressed byte array.
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.public_key.serialize()
    }

    /// Base58check address of this keypair on the given network.
    pub fn address(&self, pub_key_hash: u8) -> String {
        derive_address(&self.public_key_bytes(), pub_key_hash)
    }

    /// Signs SHA-256(message) and returns the DER-encoded signature.
    /// Nonces are RFC 6979, so signing is deterministic.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let digest: [u8; 32] = Sha256::digest(message).into();
        let message = Message::from_digest(digest);
        SECP256K1_CONTEXT
            .sign_ecdsa(&message, &self.secret_key)
            .serialize_der()
            .to_vec()
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        self.secret_key.non_secure_erase();
    }
}

/// Lowercase hex SHA-256 of the encoded transaction bytes.
pub fn compute_id(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn derive_address(public_key: &[u8; PUBLIC_KEY_SIZE], pub_key_hash: u8) -> String {
    let key_hash = Ripemd160::digest(public_key);
    let mut payload = Vec::with_capacity(ADDRESS_LENGTH);
    payload.push(pub_key_hash);
    payload.extend_from_slice(&key_hash);
    bs58::encode(payload).with_check().into_string()
}

/// Decodes a base58check address into its 21 raw bytes, checking the
/// checksum and, when given, the network version byte.
pub fn decode_address(address: &str, expected_version: Option<u8>) -> Result<Address, ClientError> {
    let bytes = bs58::decode(address)
        .with_check(expected_version)
        .into_vec()
        .map_err(|e| ClientError::InvalidAddress(format!("{}: {}", address, e)))?;

    bytes.try_into().map_err(|bytes: Vec<u8>| {
        ClientError::InvalidAddress(format!(
            "{}: expected {} bytes, got {}",
            address,
            ADDRESS_LENGTH,
            bytes.len()
        ))
    })
}

/// Verifies a DER signature over SHA-256(message).
pub fn verify_signature(
    public_key_bytes: &[u8],
    message: &[u8],
    signature_der: &[u8],
) -> Result<(), ClientError> {
    if public_key_bytes.len() != PUBLIC_KEY_SIZE {
        return Err(ClientError::Crypto(format!(
            "Public key must be exactly {} bytes (compressed), got {}",
            PUBLIC_KEY_SIZE,
            public_key_bytes.len()
        )));
    }

    let public_key = PublicKey::from_slice(public_key_bytes)
        .map_err(|e| ClientError::Crypto(format!("Invalid public key: {}", e)))?;

    let digest: [u8; 32] = Sha256::digest(message).into();
    let message = Message::from_digest(digest);

    let signature = Signature::from_der(signature_der)
        .map_err(|e| ClientError::Crypto(format!("Invalid signature: {}", e)))?;

    SECP256K1_CONTEXT
        .verify_ecdsa(&message, &signature, &public_key)
        .map_err(|_| ClientError::Crypto("Signature verification failed".to_string()))
}
