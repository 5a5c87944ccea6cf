use serde::Serialize;
use sha2::{Digest, Sha256};

/// SHA-256 of arbitrary bytes, returned as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// SHA-256 of arbitrary bytes, raw 32-byte digest.
pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Transaction hash: `sha256("sender_idx:receiver_idx:amount:unix_seconds")`.
pub fn transaction_hash(sender_idx: &str, receiver_idx: &str, amount: i64, unix_seconds: i64) -> String {
    let body = format!("{sender_idx}:{receiver_idx}:{amount}:{unix_seconds}");
    sha256_hex(body.as_bytes())
}

/// Canonical public-block body used for PoW hashing: JSON with UTF-8
/// encoding and keys sorted lexicographically — `serde_json`'s default
/// struct-field order is preserved, so callers pass a type whose fields are
/// already declared in sorted order (see `bl_consensus::miner::BlockBody`).
#[derive(Serialize)]
pub struct CanonicalBlockBody<'a> {
    pub index: u64,
    pub nonce: u64,
    pub previous_hash: &'a str,
    pub timestamp: f64,
    pub transactions: &'a [String],
}

/// Hash the canonical serialization of a public block body.
pub fn block_hash(body: &CanonicalBlockBody) -> String {
    let json = serde_json::to_vec(body).expect("canonical block body always serializes");
    sha256_hex(&json)
}
