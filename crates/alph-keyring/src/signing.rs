//! ECDSA signing over secp256k1
//!
//! Signatures are RFC 6979 deterministic and low-S normalised. Transaction
//! ids are signed as-is; free-form messages are hashed with a fixed prefix
//! first so a signed message can never double as a signed transaction.

use crate::address::blake2b256;
use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

/// Prefix mixed into every signed message
pub const MESSAGE_PREFIX: &[u8] = b"Alephium Signed Message: ";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignError {
    #[error("Invalid transaction id: {0}")]
    InvalidTxId(String),
}

/// Parse a hex transaction id into its 32-byte digest
pub fn parse_tx_id(tx_id: &str) -> Result<[u8; 32], SignError> {
    let bytes = hex::decode(tx_id).map_err(|e| SignError::InvalidTxId(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| SignError::InvalidTxId(format!("expected 32 bytes, got {}", b.len())))
}

/// Digest that [`sign_message`](crate::Keyring::sign_message) actually signs
pub fn message_digest(message: &[u8]) -> [u8; 32] {
    let mut prefixed = Vec::with_capacity(MESSAGE_PREFIX.len() + message.len());
    prefixed.extend_from_slice(MESSAGE_PREFIX);
    prefixed.extend_from_slice(message);
    blake2b256(&prefixed)
}

pub(crate) fn sign_digest(secp: &Secp256k1<All>, key: &SecretKey, digest: [u8; 32]) -> Signature {
    secp.sign_ecdsa(&Message::from_digest(digest), key)
}

/// Check a compact signature against a public key and digest
pub fn verify_signature(public_key: &PublicKey, digest: [u8; 32], signature: &Signature) -> bool {
    Secp256k1::verification_only()
        .verify_ecdsa(&Message::from_digest(digest), signature, public_key)
        .is_ok()
}
