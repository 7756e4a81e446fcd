//! Canonical block serialization and SHA-256 digest.
//!
//! Integers are little-endian, every variable-length field carries a `u64`
//! length prefix, and the nonce comes last so miners can hash the prefix once
//! and clone the hasher state per attempt.

use crate::Transaction;
use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

/// Hex SHA-256 over `(index, timestamp, transactions, prev_hash, nonce)`.
pub fn digest(
    index: u64,
    timestamp: &DateTime<Utc>,
    transactions: &[Transaction],
    prev_hash: &str,
    nonce: u64,
) -> String {
    let prefix = prefix_hasher(index, timestamp, transactions, prev_hash);
    finish(&prefix, nonce)
}

/// Hasher primed with everything except the nonce.
pub fn prefix_hasher(
    index: u64,
    timestamp: &DateTime<Utc>,
    transactions: &[Transaction],
    prev_hash: &str,
) -> Sha256 {
    let mut hasher = Sha256::new();
    hasher.update(preimage_prefix(index, timestamp, transactions, prev_hash));
    hasher
}

pub fn finish(prefix: &Sha256, nonce: u64) -> String {
    let mut hasher = prefix.clone();
    hasher.update(nonce.to_le_bytes());
    hex::encode(hasher.finalize())
}

pub fn preimage(
    index: u64,
    timestamp: &DateTime<Utc>,
    transactions: &[Transaction],
    prev_hash: &str,
    nonce: u64,
) -> Vec<u8> {
    let mut bytes = preimage_prefix(index, timestamp, transactions, prev_hash);
    bytes.extend_from_slice(&nonce.to_le_bytes());
    bytes
}

fn preimage_prefix(
    index: u64,
    timestamp: &DateTime<Utc>,
    transactions: &[Transaction],
    prev_hash: &str,
) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(128 + transactions.len() * 64);
    put_u64(&mut bytes, index);
    put_bytes(&mut bytes, timestamp_text(timestamp).as_bytes());
    put_u64(&mut bytes, transactions.len() as u64);
    for tx in transactions {
        put_transaction(&mut bytes, tx);
    }
    put_bytes(&mut bytes, prev_hash.as_bytes());
    bytes
}

/// RFC 3339 with nanoseconds and a `Z` suffix, e.g. `2020-09-13T12:26:40.123456789Z`.
pub fn timestamp_text(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn put_transaction(bytes: &mut Vec<u8>, tx: &Transaction) {
    put_bytes(bytes, tx.sender.as_bytes());
    put_bytes(bytes, tx.recipient.as_bytes());
    put_u64(bytes, tx.amount);

    put_u64(bytes, tx.inputs.len() as u64);
    for input in &tx.inputs {
        put_bytes(bytes, &input.txid);
        bytes.extend_from_slice(&input.vout.to_le_bytes());
        put_bytes(bytes, input.script_sig.as_bytes());
    }

    put_u64(bytes, tx.outputs.len() as u64);
    for output in &tx.outputs {
        put_bytes(bytes, output.address.as_bytes());
        put_u64(bytes, output.amount);
    }

    match &tx.signature {
        Some(signature) => {
            bytes.push(1);
            put_bytes(bytes, signature);
        }
        None => bytes.push(0),
    }
}

fn put_u64(bytes: &mut Vec<u8>, value: u64) {
    bytes.extend_from_slice(&value.to_le_bytes());
}

fn put_bytes(bytes: &mut Vec<u8>, value: &[u8]) {
    put_u64(bytes, value.len() as u64);
    bytes.extend_from_slice(value);
}
