//! Byzantine-fault-tolerant voting on the private chain (spec.md §4.3.3).
//!
//! Two consensus paths share one re-validation rule (sender/receiver exist
//! and are not frozen, sender balance covers amount+fee):
//!   - Domestic: all active consortium banks vote on the whole batch;
//!     ≥10 APPROVE (of the original 12) advances it.
//!   - Travel: only the sender's and receiver's bank vote, unanimously,
//!     per transaction — no Byzantine tolerance by design.
//!
//! On success the validator encrypts the batch's private payload (§4.7),
//! persists `BlockPrivate`, and settles the surviving transactions.

use bl_core::constants::{CONSORTIUM_SIZE, DOMESTIC_CONSENSUS_THRESHOLD};
use bl_core::entities::{BankVotingRecord, BlockPrivate, Transaction, TransactionBatch};
use bl_core::error::BlError;
use bl_core::types::{BatchStatus, Timestamp, TransactionStatus, TransactionType, Vote};
use bl_crypto::keymgr::KeyManager;
use bl_disclosure::encryption as disclosure;
use bl_engine::TransactionEngine;
use bl_ledger::{LedgerStore, LockTable};
use tracing::{info, warn};

/// Outcome of running consensus for one batch.
#[derive(Debug)]
pub struct BatchConsensusOutcome {
    pub batch_id: String,
    pub settled: Vec<String>,
    pub failed: Vec<String>,
    pub domestic_approvals: u32,
    pub private_block_index: Option<u64>,
}

/// Re-validate a single transaction the same way every bank and the RBI
/// auditor do: sender/receiver exist and are not frozen, sender balance
/// covers amount+fee. Pure function of already-loaded state.
pub fn revalidate_transaction(store: &LedgerStore, tx: &Transaction) -> Result<bool, BlError> {
    let sender = match store.get_account(&tx.sender_account_id)? {
        Some(a) => a,
        None => return Ok(false),
    };
    if sender.is_frozen {
        return Ok(false);
    }
    let receiver_account_id = match &tx.receiver_account_id {
        Some(id) => id,
        None => return Ok(false),
    };
    let receiver = match store.get_account(receiver_account_id)? {
        Some(a) => a,
        None => return Ok(false),
    };
    if receiver.is_frozen {
        return Ok(false);
    }
    Ok(sender.balance >= tx.amount + tx.fee)
}

/// Every transaction in `batch`'s sequence range, partitioned into
/// (domestic, travel), regardless of status.
pub fn batch_transactions_by_type(
    store: &LedgerStore,
    batch: &TransactionBatch,
) -> Result<(Vec<Transaction>, Vec<Transaction>), BlError> {
    let mut domestic = Vec::new();
    let mut travel = Vec::new();
    for seq in batch.sequence_start..=batch.sequence_end {
        if let Some(tx) = store.get_transaction_by_sequence(seq)? {
            if tx.transaction_type.is_travel() {
                travel.push(tx);
            } else {
                domestic.push(tx);
            }
        }
    }
    Ok((domestic, travel))
}

/// As [`batch_transactions_by_type`], restricted to transactions the
/// consensus pass is about to vote on (`PUBLIC_CONFIRMED`).
fn batch_confirmed_transactions(
    store: &LedgerStore,
    batch: &TransactionBatch,
) -> Result<(Vec<Transaction>, Vec<Transaction>), BlError> {
    let (domestic, travel) = batch_transactions_by_type(store, batch)?;
    let filter = |txs: Vec<Transaction>| {
        txs.into_iter()
            .filter(|tx| tx.status == TransactionStatus::PublicConfirmed)
            .collect()
    };
    Ok((filter(domestic), filter(travel)))
}

/// The decision an honest bank reaches on a domestic batch: APPROVE only
/// if every transaction in the set re-validates, otherwise REJECT the
/// whole batch (per-transaction isolation is applied separately during
/// finalization, not in the vote itself). Shared with the RBI auditor so
/// it can detect banks that voted against this outcome.
pub fn expected_domestic_vote(store: &LedgerStore, domestic_txs: &[Transaction]) -> Result<Vote, BlError> {
    for tx in domestic_txs {
        if !revalidate_transaction(store, tx)? {
            return Ok(Vote::Reject);
        }
    }
    Ok(Vote::Approve)
}

/// Cast and persist every active domestic bank's vote on `domestic_txs`.
fn cast_domestic_votes(
    store: &LedgerStore,
    batch_id: &str,
    domestic_txs: &[Transaction],
) -> Result<u32, BlError> {
    let vote = expected_domestic_vote(store, domestic_txs)?;

    let mut approvals = 0u32;
    for bank in store.iter_domestic_consortium_banks()? {
        if !bank.is_active {
            continue; // implicit REJECT — still counted against the fixed 12.
        }
        store.put_vote_new(&BankVotingRecord {
            batch_id: batch_id.to_string(),
            bank_code: bank.bank_code.clone(),
            vote,
            validation_time_ms: 0,
            is_correct: None,
            rbi_verified: false,
            was_slashed: false,
            slash_amount: 0,
            challenged_by: None,
            group_signature: None,
        })?;
        if vote == Vote::Approve {
            approvals += 1;
        }
    }
    Ok(approvals)
}

/// 2-of-2 unanimous vote between a travel transaction's sender and
/// receiver bank. Returns `true` only if both banks approve.
/// Vote scope used as the `batch_id` field for a travel transaction's
/// 2-of-2 vote. Namespaced by transaction hash so it never collides with
/// the whole-batch domestic vote under the same real `batch_id` — both
/// still fall under `iter_votes_for_batch(batch_id)`'s prefix scan.
fn travel_vote_scope(batch_id: &str, tx_hash: &str) -> String {
    format!("{batch_id}:{tx_hash}")
}

fn cast_travel_vote(store: &LedgerStore, batch_id: &str, tx: &Transaction) -> Result<bool, BlError> {
    let valid = revalidate_transaction(store, tx)?;
    let vote = if valid { Vote::Approve } else { Vote::Reject };
    let scope = travel_vote_scope(batch_id, &tx.transaction_hash);

    let sender_bank = store
        .get_account(&tx.sender_account_id)?
        .map(|a| a.bank_code)
        .unwrap_or_default();
    let receiver_bank = tx
        .receiver_account_id
        .as_ref()
        .and_then(|id| store.get_account(id).ok().flatten())
        .map(|a| a.bank_code)
        .unwrap_or_default();

    for bank_code in [sender_bank, receiver_bank] {
        if bank_code.is_empty() {
            continue;
        }
        let record = BankVotingRecord {
            batch_id: scope.clone(),
            bank_code,
            vote,
            validation_time_ms: 0,
            is_correct: None,
            rbi_verified: false,
            was_slashed: false,
            slash_amount: 0,
            challenged_by: None,
            group_signature: None,
        };
        // The sender and receiver bank are usually distinct; if a travel
        // transfer is ever self-custodied at one bank, only its first
        // vote under this scope is kept.
        let _ = store.put_vote_new(&record);
    }

    Ok(valid)
}

/// Drive consensus for `batch`: confirm its transactions onto the public
/// block, run the domestic and travel votes, settle the survivors, and
/// persist the private block. `master_key` is the reconstructed global
/// master key used to encrypt the batch's private payload.
#[allow(clippy::too_many_arguments)]
pub fn run_consensus(
    store: &LedgerStore,
    locks: &LockTable,
    keymgr: &KeyManager,
    batch: &mut TransactionBatch,
    public_block_index: u64,
    now: Timestamp,
) -> Result<BatchConsensusOutcome, BlError> {
    let engine = TransactionEngine::new(store, locks);

    for seq in batch.sequence_start..=batch.sequence_end {
        if let Some(tx) = store.get_transaction_by_sequence(seq)? {
            if tx.status == TransactionStatus::Mining {
                engine.confirm_public(&tx.transaction_hash, &batch.batch_id, public_block_index)?;
            }
        }
    }

    let (domestic_txs, travel_txs) = batch_confirmed_transactions(store, batch)?;

    let domestic_approvals = if domestic_txs.is_empty() {
        0
    } else {
        cast_domestic_votes(store, &batch.batch_id, &domestic_txs)?
    };
    let domestic_consensus_reached =
        domestic_txs.is_empty() || domestic_approvals >= DOMESTIC_CONSENSUS_THRESHOLD;

    let mut settled = Vec::new();
    let mut failed = Vec::new();
    let mut settled_txs = Vec::new();

    if domestic_consensus_reached {
        for tx in &domestic_txs {
            if revalidate_transaction(store, tx)? {
                engine.confirm_private(&tx.transaction_hash, public_block_index)?;
                let completed = engine.settle(&tx.transaction_hash, now)?;
                if completed.status == TransactionStatus::Completed {
                    settled.push(completed.transaction_hash.clone());
                    settled_txs.push(completed);
                } else {
                    failed.push(tx.transaction_hash.clone());
                }
            } else {
                engine.fail(&tx.transaction_hash)?;
                failed.push(tx.transaction_hash.clone());
            }
        }
    } else {
        warn!(
            batch_id = %batch.batch_id,
            approvals = domestic_approvals,
            required = DOMESTIC_CONSENSUS_THRESHOLD,
            "domestic consensus failed, of {CONSORTIUM_SIZE} consortium banks"
        );
        for tx in &domestic_txs {
            engine.fail(&tx.transaction_hash)?;
            failed.push(tx.transaction_hash.clone());
        }
    }

    for tx in &travel_txs {
        if cast_travel_vote(store, &batch.batch_id, tx)? {
            engine.confirm_private(&tx.transaction_hash, public_block_index)?;
            let completed = engine.settle(&tx.transaction_hash, now)?;
            if completed.status == TransactionStatus::Completed {
                settled.push(completed.transaction_hash.clone());
                settled_txs.push(completed);
            } else {
                failed.push(tx.transaction_hash.clone());
            }
        } else {
            engine.fail(&tx.transaction_hash)?;
            failed.push(tx.transaction_hash.clone());
        }
    }

    let private_block_index = if !settled_txs.is_empty() {
        let master_key = disclosure::reconstruct_master_key(keymgr, now)?;
        let payload = disclosure::build_block_payload(&settled_txs, now);
        let encrypted_data = disclosure::encrypt_block_payload(&payload, &master_key)?;

        let index = store.next_private_block_index()?;
        let total_approvals = domestic_approvals + travel_txs.len() as u32;
        store.put_block_private(&BlockPrivate {
            block_index: index,
            block_hash: format!("PRIVATE_{}", bl_crypto::sha256_hex(encrypted_data.as_bytes())),
            linked_public_block: public_block_index,
            encrypted_data,
            consensus_votes: total_approvals,
            consensus_achieved: true,
        })?;
        Some(index)
    } else {
        None
    };

    batch.status = if settled.is_empty() {
        BatchStatus::Failed
    } else {
        BatchStatus::Completed
    };
    batch.public_block_index = Some(public_block_index);
    batch.private_block_index = private_block_index;
    store.put_batch(batch)?;

    info!(
        batch_id = %batch.batch_id,
        settled = settled.len(),
        failed = failed.len(),
        "consensus finalized"
    );

    Ok(BatchConsensusOutcome {
        batch_id: batch.batch_id.clone(),
        settled,
        failed,
        domestic_approvals,
        private_block_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bl_core::entities::BankAccount;
    use bl_core::types::{Idx, SessionId};
    use bl_crypto::keymgr::RBI_MASTER_KEY;

    fn store() -> LedgerStore {
        let dir = tempfile::tempdir().unwrap();
        LedgerStore::open(dir.path().join("db")).unwrap()
    }

    fn account(id: &str, idx: &str, bank: &str, balance: i64) -> BankAccount {
        BankAccount {
            id: id.to_string(),
            user_idx: Idx(idx.to_string()),
            bank_code: bank.to_string(),
            account_number: format!("{bank}-{id}"),
            balance,
            is_active: true,
            is_frozen: false,
            account_type: bl_core::entities::AccountType::Retail,
            created_at: 0,
        }
    }

    fn bank(code: &str, active: bool) -> bl_core::entities::Bank {
        bl_core::entities::Bank {
            bank_code: code.to_string(),
            bank_name: code.to_string(),
            stake_amount: 1_000_000,
            initial_stake: 1_000_000,
            is_active: active,
            total_validations: 0,
            total_fees_earned: 0,
            penalty_count: 0,
            total_penalties: 0,
            honest_verifications: 0,
            malicious_verifications: 0,
            last_fiscal_year_reward: None,
            is_domestic_consortium_member: true,
        }
    }

    fn seed_consortium(store: &LedgerStore, active: u32) {
        for i in 0..CONSORTIUM_SIZE as u32 {
            store
                .put_bank(&bank(&format!("BANK{i}"), i < active))
                .unwrap();
        }
    }

    fn keymgr() -> KeyManager {
        let km = KeyManager::new();
        km.seed(RBI_MASTER_KEY, b"rbi-half".to_vec(), 0);
        km
    }

    #[test]
    fn domestic_consensus_settles_on_ten_of_twelve() {
        let store = store();
        seed_consortium(&store, 12);
        let locks = LockTable::new();
        let engine = TransactionEngine::new(&store, &locks);

        let sender = account("acc-a", "IDX_a", "HDFC", 10_000);
        let receiver = account("acc-b", "IDX_b", "ICICI", 0);
        store.put_account_new(&sender).unwrap();
        store.put_account_new(&receiver).unwrap();

        let tx = engine
            .create(
                "acc-a",
                Some("acc-b"),
                Idx("IDX_a".to_string()),
                Idx("IDX_b".to_string()),
                SessionId("SESSION_a".to_string()),
                Some(SessionId("SESSION_b".to_string())),
                1_000,
                TransactionType::Domestic,
                1000,
            )
            .unwrap();
        let anomaly = bl_anomaly::evaluate(&store, &tx, 1000).unwrap();
        engine.start_mining(&tx.transaction_hash, anomaly, 1000).unwrap();

        let mut batch = crate::batch::build_next_batch(&store, "batch-1").unwrap().unwrap();
        let km = keymgr();
        let outcome = run_consensus(&store, &locks, &km, &mut batch, 1, 1010).unwrap();

        assert_eq!(outcome.domestic_approvals, 12);
        assert_eq!(outcome.settled.len(), 1);
        assert!(outcome.private_block_index.is_some());
        assert_eq!(batch.status, BatchStatus::Completed);

        let receiver_after = store.get_account("acc-b").unwrap().unwrap();
        assert_eq!(receiver_after.balance, 1_000);
    }

    #[test]
    fn insufficient_active_banks_fails_the_batch() {
        let store = store();
        seed_consortium(&store, 9); // below the 10-of-12 threshold
        let locks = LockTable::new();
        let engine = TransactionEngine::new(&store, &locks);

        let sender = account("acc-a", "IDX_a", "HDFC", 10_000);
        let receiver = account("acc-b", "IDX_b", "ICICI", 0);
        store.put_account_new(&sender).unwrap();
        store.put_account_new(&receiver).unwrap();

        let tx = engine
            .create(
                "acc-a",
                Some("acc-b"),
                Idx("IDX_a".to_string()),
                Idx("IDX_b".to_string()),
                SessionId("SESSION_a".to_string()),
                Some(SessionId("SESSION_b".to_string())),
                1_000,
                TransactionType::Domestic,
                1000,
            )
            .unwrap();
        let anomaly = bl_anomaly::evaluate(&store, &tx, 1000).unwrap();
        engine.start_mining(&tx.transaction_hash, anomaly, 1000).unwrap();

        let mut batch = crate::batch::build_next_batch(&store, "batch-1").unwrap().unwrap();
        let km = keymgr();
        let outcome = run_consensus(&store, &locks, &km, &mut batch, 1, 1010).unwrap();

        assert_eq!(outcome.settled.len(), 0);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(batch.status, BatchStatus::Failed);

        let tx_after = store.get_transaction(&tx.transaction_hash).unwrap().unwrap();
        assert_eq!(tx_after.status, TransactionStatus::Failed);
    }
}
