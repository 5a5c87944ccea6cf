//! IDX derivation: `idx = "IDX_" || hex(sha256("PAN:RBI:PEPPER"))`.
//!
//! Deterministic in (pan, rbi, pepper) so the same regulatory identity
//! always maps to the same anonymous id, but irreversible without the
//! pepper — grounded on the teacher's `chronx-crypto::keypair` address
//! derivation (hash-then-prefix) and `original_source/core/crypto/idx_generator.py`.

use once_cell::sync::Lazy;
use regex::Regex;
use subtle::ConstantTimeEq;

use bl_core::error::BlError;
use bl_core::types::Idx;
use bl_crypto::sha256_bytes;

static PAN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{5}[0-9]{4}[A-Z]$").unwrap());
static RBI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9]{6}$").unwrap());

fn normalize(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Validate and normalize a PAN/RBI pair, returning the normalized forms.
pub fn validate(pan: &str, rbi: &str) -> Result<(String, String), BlError> {
    let pan = normalize(pan);
    let rbi = normalize(rbi);
    if !PAN_RE.is_match(&pan) {
        return Err(BlError::InvalidIdentityFormat(format!("invalid PAN: {pan}")));
    }
    if !RBI_RE.is_match(&rbi) {
        return Err(BlError::InvalidIdentityFormat(format!("invalid RBI number: {rbi}")));
    }
    Ok((pan, rbi))
}

/// Derive the anonymous IDX for a (PAN, RBI) pair under the given pepper.
pub fn derive(pan: &str, rbi: &str, pepper: &str) -> Result<Idx, BlError> {
    let (pan, rbi) = validate(pan, rbi)?;
    let material = format!("{pan}:{rbi}:{pepper}");
    let digest = sha256_bytes(material.as_bytes());
    Ok(Idx(format!("IDX_{}", hex::encode(digest))))
}

/// Re-derive from (PAN, RBI, pepper) and compare against `candidate` in
/// constant time.
pub fn verify(pan: &str, rbi: &str, pepper: &str, candidate: &Idx) -> Result<bool, BlError> {
    let expected = derive(pan, rbi, pepper)?;
    Ok(expected
        .as_str()
        .as_bytes()
        .ct_eq(candidate.as_str().as_bytes())
        .unwrap_u8()
        == 1)
}
