//! Transaction lifecycle state machine (spec.md §4.2):
//!
//! ```text
//! PENDING ──select──▶ AWAITING_RECEIVER ──confirm──▶ PENDING
//!    │                                  ╲─reject──▶ REJECTED
//!    ▼
//! MINING ──block persisted──▶ PUBLIC_CONFIRMED ──consensus──▶ PRIVATE_CONFIRMED ──settle──▶ COMPLETED
//!    │                                                                             ╲─fail──▶ FAILED
//! ```
//!
//! `TransactionEngine` owns no state of its own — it drives `LedgerStore`
//! through the transitions, with `LockTable` guarding settlement.

use bl_core::entities::{BankAccount, Transaction};
use bl_core::error::BlError;
use bl_core::types::{Idx, SessionId, Timestamp, TransactionStatus, TransactionType};
use bl_ledger::{LedgerStore, LockTable};
use tracing::{info, warn};

use crate::fees;

pub struct TransactionEngine<'a> {
    store: &'a LedgerStore,
    locks: &'a LockTable,
}

impl<'a> TransactionEngine<'a> {
    pub fn new(store: &'a LedgerStore, locks: &'a LockTable) -> Self {
        Self { store, locks }
    }

    /// Create a transfer. No balances move here — only validation, fee
    /// computation, and row insertion under the replay-guard indexes.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &self,
        sender_account_id: &str,
        receiver_account_id: Option<&str>,
        sender_idx: Idx,
        receiver_idx: Idx,
        sender_session_id: SessionId,
        receiver_session_id: Option<SessionId>,
        amount: i64,
        transaction_type: TransactionType,
        now: Timestamp,
    ) -> Result<Transaction, BlError> {
        if amount <= 0 {
            return Err(BlError::ZeroAmount);
        }

        let sender_account = self
            .store
            .get_account(sender_account_id)?
            .ok_or_else(|| BlError::UnknownAccount(sender_account_id.to_string()))?;
        if sender_account.is_frozen {
            return Err(BlError::AccountFrozen(sender_account_id.to_string()));
        }

        let breakdown = fees::compute(amount);
        if sender_account.balance < amount + breakdown.fee {
            return Err(BlError::InsufficientBalance {
                need: amount + breakdown.fee,
                have: sender_account.balance,
            });
        }

        if let Some(receiver_account_id) = receiver_account_id {
            self.store
                .get_account(receiver_account_id)?
                .ok_or_else(|| BlError::UnknownAccount(receiver_account_id.to_string()))?;
        }

        let sequence_number = self.store.next_sequence_number()?;
        let transaction_hash =
            bl_crypto::transaction_hash(sender_idx.as_str(), receiver_idx.as_str(), amount, now);
        let nullifier = bl_crypto::sha256_hex(
            format!("nullifier:{transaction_hash}:{}", sender_idx.as_str()).as_bytes(),
        );

        let status = if receiver_account_id.is_some() {
            TransactionStatus::Pending
        } else {
            TransactionStatus::AwaitingReceiver
        };

        let tx = Transaction {
            sequence_number,
            transaction_hash: transaction_hash.clone(),
            sender_account_id: sender_account_id.to_string(),
            receiver_account_id: receiver_account_id.map(|s| s.to_string()),
            sender_idx,
            receiver_idx,
            sender_session_id,
            receiver_session_id,
            amount,
            fee: breakdown.fee,
            miner_fee: breakdown.miner_fee,
            bank_fee: breakdown.bank_fee,
            transaction_type,
            status,
            batch_id: None,
            public_block_index: None,
            private_block_index: None,
            commitment: transaction_hash.clone(),
            nullifier,
            encrypted_data: None,
            encrypted_key: None,
            anomaly_score: None,
            anomaly_flags: vec![],
            requires_investigation: false,
            created_at: now,
            completed_at: None,
            flagged_at: None,
        };

        self.store.put_transaction_new(&tx)?;
        info!(hash = %transaction_hash, status = ?tx.status, "transaction created");
        Ok(tx)
    }

    /// Receiver attaches their account: AWAITING_RECEIVER -> PENDING.
    pub fn confirm_receiver(
        &self,
        transaction_hash: &str,
        receiver_account_id: &str,
        receiver_idx: Idx,
        receiver_session_id: SessionId,
    ) -> Result<Transaction, BlError> {
        let mut tx = self.require(transaction_hash)?;
        self.expect_status(&tx, TransactionStatus::AwaitingReceiver, "confirm_receiver")?;

        self.store
            .get_account(receiver_account_id)?
            .ok_or_else(|| BlError::UnknownAccount(receiver_account_id.to_string()))?;

        tx.receiver_account_id = Some(receiver_account_id.to_string());
        tx.receiver_idx = receiver_idx;
        tx.receiver_session_id = Some(receiver_session_id);
        tx.status = TransactionStatus::Pending;
        self.store.put_transaction(&tx)?;
        info!(hash = %transaction_hash, "receiver confirmed");
        Ok(tx)
    }

    /// AWAITING_RECEIVER -> REJECTED (terminal).
    pub fn reject(&self, transaction_hash: &str) -> Result<Transaction, BlError> {
        let mut tx = self.require(transaction_hash)?;
        self.expect_status(&tx, TransactionStatus::AwaitingReceiver, "reject")?;
        tx.status = TransactionStatus::Rejected;
        self.store.put_transaction(&tx)?;
        warn!(hash = %transaction_hash, "transaction rejected");
        Ok(tx)
    }

    /// PENDING -> MINING, annotating with the anomaly score (spec.md §4.2
    /// "before mining, the anomaly detector scores the transaction").
    pub fn start_mining(
        &self,
        transaction_hash: &str,
        anomaly: bl_anomaly::AnomalyResult,
        now: Timestamp,
    ) -> Result<Transaction, BlError> {
        let mut tx = self.require(transaction_hash)?;
        self.expect_status(&tx, TransactionStatus::Pending, "start_mining")?;
        tx.anomaly_score = Some(anomaly.score);
        tx.anomaly_flags = anomaly.flags;
        tx.requires_investigation = anomaly.requires_investigation;
        if anomaly.requires_investigation {
            tx.flagged_at = Some(now);
        }
        tx.status = TransactionStatus::Mining;
        self.store.put_transaction(&tx)?;
        Ok(tx)
    }

    /// MINING -> PUBLIC_CONFIRMED once the coordinator persists a block
    /// containing this transaction's hash.
    pub fn confirm_public(
        &self,
        transaction_hash: &str,
        batch_id: &str,
        public_block_index: u64,
    ) -> Result<Transaction, BlError> {
        let mut tx = self.require(transaction_hash)?;
        self.expect_status(&tx, TransactionStatus::Mining, "confirm_public")?;
        tx.batch_id = Some(batch_id.to_string());
        tx.public_block_index = Some(public_block_index);
        tx.status = TransactionStatus::PublicConfirmed;
        self.store.put_transaction(&tx)?;
        info!(hash = %transaction_hash, public_block_index, "public block confirmed");
        Ok(tx)
    }

    /// PUBLIC_CONFIRMED -> PRIVATE_CONFIRMED once bank consensus approves.
    pub fn confirm_private(
        &self,
        transaction_hash: &str,
        private_block_index: u64,
    ) -> Result<Transaction, BlError> {
        let mut tx = self.require(transaction_hash)?;
        self.expect_status(&tx, TransactionStatus::PublicConfirmed, "confirm_private")?;
        tx.private_block_index = Some(private_block_index);
        tx.status = TransactionStatus::PrivateConfirmed;
        self.store.put_transaction(&tx)?;
        Ok(tx)
    }

    /// Atomic settlement: re-check sender balance under the lock table
    /// (final double-spend guard), move balances, distribute fees, and mark
    /// COMPLETED. If the recheck fails the transaction transitions to
    /// FAILED instead and no balances move; the miner keeps their fee.
    pub fn settle(&self, transaction_hash: &str, now: Timestamp) -> Result<Transaction, BlError> {
        let mut tx = self.require(transaction_hash)?;
        self.expect_status(&tx, TransactionStatus::PrivateConfirmed, "settle")?;

        let receiver_account_id = tx
            .receiver_account_id
            .clone()
            .ok_or_else(|| BlError::InvalidStateTransition {
                from: format!("{:?}", tx.status),
                action: "settle".to_string(),
            })?;

        let settled = self.locks.with_pair(&tx.sender_account_id, &receiver_account_id, || {
            self.try_settle_locked(&tx, &receiver_account_id)
        })?;

        if settled {
            tx.status = TransactionStatus::Completed;
            tx.completed_at = Some(now);
            info!(hash = %transaction_hash, "transaction completed");
        } else {
            tx.status = TransactionStatus::Failed;
            warn!(hash = %transaction_hash, "settlement failed balance recheck");
        }
        self.store.put_transaction(&tx)?;
        Ok(tx)
    }

    /// Runs under both account locks held. Returns `true` if balances moved.
    fn try_settle_locked(&self, tx: &Transaction, receiver_account_id: &str) -> Result<bool, BlError> {
        let mut sender = self
            .store
            .get_account(&tx.sender_account_id)?
            .ok_or_else(|| BlError::UnknownAccount(tx.sender_account_id.clone()))?;
        let mut receiver = self
            .store
            .get_account(receiver_account_id)?
            .ok_or_else(|| BlError::UnknownAccount(receiver_account_id.to_string()))?;

        if sender.balance < tx.amount + tx.fee {
            return Ok(false);
        }

        sender.balance -= tx.amount + tx.fee;
        receiver.balance += tx.amount;
        self.store.put_account(&sender)?;
        self.store.put_account(&receiver)?;
        self.distribute_bank_fee(tx, &sender, &receiver)?;
        Ok(true)
    }

    /// Spec §4.2/§4.3.1: `bank_fee` goes to the validating consortium, not
    /// the counterparties. Domestic transfers split it 12 ways across the
    /// domestic consortium; travel transfers split it between the sender's
    /// and receiver's bank. The miner's half of the fee is credited
    /// separately, at block-submission time (`miner.rs::submit_block`) —
    /// it is not touched here.
    fn distribute_bank_fee(
        &self,
        tx: &Transaction,
        sender: &BankAccount,
        receiver: &BankAccount,
    ) -> Result<(), BlError> {
        if tx.bank_fee == 0 {
            return Ok(());
        }

        if tx.transaction_type.is_travel() {
            let (sender_share, receiver_share) = fees::split_travel(tx.bank_fee);
            self.credit_bank_fee(&sender.bank_code, sender_share)?;
            self.credit_bank_fee(&receiver.bank_code, receiver_share)?;
        } else {
            let banks = self.store.iter_domestic_consortium_banks()?;
            let bank_codes: Vec<String> = banks.into_iter().map(|b| b.bank_code).collect();
            for (bank_code, share) in fees::split_domestic(tx.bank_fee, &bank_codes) {
                self.credit_bank_fee(bank_code, share)?;
            }
        }
        Ok(())
    }

    fn credit_bank_fee(&self, bank_code: &str, share: i64) -> Result<(), BlError> {
        if share == 0 {
            return Ok(());
        }
        if let Some(mut bank) = self.store.get_bank(bank_code)? {
            bank.total_fees_earned += share;
            self.store.put_bank(&bank)?;
        } else {
            warn!(bank_code, share, "fee share owed to unregistered bank, dropped");
        }
        Ok(())
    }

    /// Any non-terminal status -> FAILED (e.g. consensus rejection).
    pub fn fail(&self, transaction_hash: &str) -> Result<Transaction, BlError> {
        let mut tx = self.require(transaction_hash)?;
        if tx.status.is_terminal() {
            return Err(BlError::InvalidStateTransition {
                from: format!("{:?}", tx.status),
                action: "fail".to_string(),
            });
        }
        tx.status = TransactionStatus::Failed;
        self.store.put_transaction(&tx)?;
        warn!(hash = %transaction_hash, "transaction marked failed");
        Ok(tx)
    }

    fn require(&self, transaction_hash: &str) -> Result<Transaction, BlError> {
        self.store
            .get_transaction(transaction_hash)?
            .ok_or_else(|| BlError::UnknownTransaction(transaction_hash.to_string()))
    }

    fn expect_status(
        &self,
        tx: &Transaction,
        expected: TransactionStatus,
        action: &str,
    ) -> Result<(), BlError> {
        if tx.status != expected {
            return Err(BlError::InvalidStateTransition {
                from: format!("{:?}", tx.status),
                action: action.to_string(),
            });
        }
        Ok(())
    }
}
