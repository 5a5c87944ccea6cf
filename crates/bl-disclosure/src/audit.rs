//! Append-only, hash-chained audit log (spec.md §4.4 "Audit log"). Every
//! key issuance, decryption, and judge verification outcome is recorded
//! here; each entry's hash commits to the previous entry's hash, so
//! tampering with history is detectable by recomputing the chain.

use bl_core::entities::AuditLogEntry;
use bl_core::error::BlError;
use bl_core::types::Timestamp;
use bl_ledger::LedgerStore;
use tracing::info;

const GENESIS_PREV_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000";

fn compute_entry_hash(seq: u64, event_type: &str, event_data: &str, timestamp: Timestamp, prev_hash: &str) -> String {
    let body = format!("{seq}:{event_type}:{event_data}:{timestamp}:{prev_hash}");
    bl_crypto::sha256_hex(body.as_bytes())
}

/// Append a new entry to the chain, linking it to the current tail.
pub fn log_event(store: &LedgerStore, event_type: &str, event_data: &str, now: Timestamp) -> Result<AuditLogEntry, BlError> {
    let seq = store.next_audit_seq()?;
    let prev_hash = store
        .latest_audit_entry()?
        .map(|e| e.entry_hash)
        .unwrap_or_else(|| GENESIS_PREV_HASH.to_string());
    let entry_hash = compute_entry_hash(seq, event_type, event_data, now, &prev_hash);

    let entry = AuditLogEntry {
        seq,
        event_type: event_type.to_string(),
        event_data: event_data.to_string(),
        timestamp: now,
        prev_hash,
        entry_hash,
    };
    store.put_audit_entry(&entry)?;
    info!(seq, event_type, "audit entry recorded");
    Ok(entry)
}

/// Verify the chain is unbroken: each entry's `prev_hash` must equal the
/// previous entry's `entry_hash`, and each `entry_hash` must recompute.
pub fn verify_chain(entries: &[AuditLogEntry]) -> bool {
    let mut expected_prev = GENESIS_PREV_HASH.to_string();
    for entry in entries {
        if entry.prev_hash != expected_prev {
            return false;
        }
        let recomputed = compute_entry_hash(
            entry.seq,
            &entry.event_type,
            &entry.event_data,
            entry.timestamp,
            &entry.prev_hash,
        );
        if recomputed != entry.entry_hash {
            return false;
        }
        expected_prev = entry.entry_hash.clone();
    }
    true
}
