//! Batching (spec.md §4.3.1): group pending transactions into contiguous,
//! non-overlapping windows of at most `MAX_BATCH_SIZE`, ordered by
//! `sequence_number`, and build a Merkle tree over their canonical records.
//!
//! Mirrors the teacher's habit of keeping batch assembly as a pure
//! function over already-loaded state (`chronx-consensus::difficulty`
//! does the same: state goes in, a decision comes out, no I/O inside).

use bl_core::constants::MAX_BATCH_SIZE;
use bl_core::entities::{Transaction, TransactionBatch};
use bl_core::error::BlError;
use bl_core::types::BatchStatus;
use bl_ledger::LedgerStore;
use tracing::info;

/// Canonical per-transaction record hashed into the Merkle leaf layer.
/// Stable field order and separators — any change here invalidates every
/// previously recorded `merkle_root`.
fn canonical_record(tx: &Transaction) -> String {
    format!(
        "{}:{}:{}:{}:{}",
        tx.sequence_number, tx.transaction_hash, tx.sender_idx, tx.receiver_idx, tx.amount
    )
}

/// Scan `PENDING` transactions in `store`, take up to `MAX_BATCH_SIZE` of
/// the lowest `sequence_number`s, and assemble a `TransactionBatch` in
/// `READY` status. Returns `Ok(None)` if there is nothing pending.
pub fn build_next_batch(store: &LedgerStore, batch_id: &str) -> Result<Option<TransactionBatch>, BlError> {
    let mut pending = store.iter_pending_transactions()?;
    if pending.is_empty() {
        return Ok(None);
    }

    pending.sort_by_key(|tx| tx.sequence_number);
    pending.truncate(MAX_BATCH_SIZE);

    let sequence_start = pending.first().unwrap().sequence_number;
    let sequence_end = pending.last().unwrap().sequence_number;

    let records: Vec<String> = pending.iter().map(canonical_record).collect();
    let tree = bl_crypto::MerkleTree::build(&records);
    let merkle_tree =
        serde_json::to_vec(&tree.levels).map_err(|e| BlError::Serialization(e.to_string()))?;

    let batch = TransactionBatch {
        batch_id: batch_id.to_string(),
        sequence_start,
        sequence_end,
        transaction_count: pending.len(),
        merkle_root: tree.root,
        merkle_tree,
        status: BatchStatus::Ready,
        public_block_index: None,
        private_block_index: None,
        challenged_by: None,
    };

    info!(
        batch_id,
        count = batch.transaction_count,
        sequence_start,
        sequence_end,
        "batch assembled"
    );
    Ok(Some(batch))
}
