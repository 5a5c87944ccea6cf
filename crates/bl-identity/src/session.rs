//! Session issuance and rotation.
//!
//! `session_id = "SESSION_" || hex(sha256("IDX:BANK:ACCOUNT_ID:TIMESTAMP_MS:SALT"))`,
//! ported from `core/crypto/session_id.py`'s `SessionIDGenerator`.
//! A (user, account) pair reuses its active unexpired session; once expired
//! it is marked inactive and a fresh one is minted. Grounded on
//! `original_source/core/services/session_service.py`'s
//! `get_or_create_session` and `original_source/core/session/rotation.py`'s
//! `_rotate_expired_sessions`, plus the teacher's `chronx-state`
//! "mark inactive, don't delete" row lifecycle.

use rand::RngCore;

use bl_core::entities::Session;
use bl_core::types::{Idx, SessionId, Timestamp};

const SESSION_LIFETIME_SECONDS: i64 = 24 * 60 * 60;

fn random_salt_hex() -> String {
    let mut salt = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut salt);
    hex::encode(salt)
}

/// Mint a new session id for (idx, bank_code, account_id) at `now`
/// (unix seconds; millisecond granularity is supplied by the caller via
/// `now_ms` to match the source's `TIMESTAMP_MS` component).
pub fn new_session_id(idx: &Idx, bank_code: &str, account_id: &str, now_ms: i64) -> SessionId {
    let salt = random_salt_hex();
    let material = format!("{}:{bank_code}:{account_id}:{now_ms}:{salt}", idx.as_str());
    SessionId(format!("SESSION_{}", bl_crypto::sha256_hex(material.as_bytes())))
}

/// Build a freshly issued `Session` row. Callers (`bl-ledger`) are
/// responsible for checking whether an active unexpired session already
/// exists for (user_idx, bank_account_id) and reusing it instead of calling
/// this constructor — issuance itself is unconditional.
pub fn issue(
    user_idx: Idx,
    bank_code: String,
    bank_account_id: String,
    now: Timestamp,
    now_ms: i64,
) -> Session {
    let session_id = new_session_id(&user_idx, &bank_code, &bank_account_id, now_ms);
    Session {
        session_id,
        user_idx,
        bank_code,
        bank_account_id,
        created_at: now,
        expires_at: now + SESSION_LIFETIME_SECONDS,
        is_active: true,
    }
}

/// True if `session` is still usable at `now`.
pub fn is_valid(session: &Session, now: Timestamp) -> bool {
    session.is_active && !session.is_expired(now)
}

/// Scan a batch of sessions and deactivate any that have expired as of
/// `now`, returning the ids that were rotated out. The caller persists the
/// flips and mints replacements for any (user, account) pairs that still
/// need one — rotation here is pure bookkeeping, not side-effecting.
pub fn rotate_expired(sessions: &mut [Session], now: Timestamp) -> Vec<SessionId> {
    let mut rotated = Vec::new();
    for session in sessions.iter_mut() {
        if session.is_active && session.is_expired(now) {
            session.is_active = false;
            rotated.push(session.session_id.clone());
        }
    }
    rotated
}
