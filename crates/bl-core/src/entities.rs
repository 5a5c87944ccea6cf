//! Entity contracts (spec §3). These are plain structs persisted by
//! `bl-ledger`; no entity holds a pointer/reference to another — all
//! relationships are by id, looked up through indexed store queries.

use serde::{Deserialize, Serialize};

use crate::types::{
    Amount, BatchStatus, CourtOrderStatus, FiscalYear, Idx, SequenceNumber, SessionId, Timestamp,
    TransactionStatus, TransactionType, TreasuryEntryType, Vote,
};

// ── User ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub idx: Idx,
    /// Regulatory id. Never leaves the server except under disclosure.
    pub pan_card: String,
    pub full_name: String,
    /// Legacy aggregate; derived view only. Never written by the engine.
    pub balance: Amount,
    pub created_at: Timestamp,
}

// ── BankAccount ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: String,
    pub user_idx: Idx,
    pub bank_code: String,
    pub account_number: String,
    pub balance: Amount,
    pub is_active: bool,
    pub is_frozen: bool,
    pub account_type: AccountType,
    pub created_at: Timestamp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    Retail,
    Business,
}

// ── Session ──────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub user_idx: Idx,
    pub bank_code: String,
    pub bank_account_id: String,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub is_active: bool,
}

impl Session {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.expires_at
    }
}

// ── Bank ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Bank {
    pub bank_code: String,
    pub bank_name: String,
    pub stake_amount: Amount,
    pub initial_stake: Amount,
    pub is_active: bool,
    pub total_validations: u64,
    pub total_fees_earned: Amount,
    pub penalty_count: u32,
    pub total_penalties: Amount,
    pub honest_verifications: u64,
    pub malicious_verifications: u64,
    pub last_fiscal_year_reward: Option<FiscalYear>,
    /// Whether this is a foreign/travel-only bank (e.g. "FOREIGN_US_JPM"),
    /// excluded from the 12-bank domestic consortium vote.
    pub is_domestic_consortium_member: bool,
}

impl Bank {
    pub fn stake_ratio_bps(&self) -> i64 {
        if self.initial_stake == 0 {
            return 0;
        }
        (self.stake_amount.saturating_mul(10_000)) / self.initial_stake
    }
}

// ── Recipient ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Recipient {
    pub owner_idx: Idx,
    pub recipient_idx: Idx,
    pub nickname: String,
    pub current_session_id: Option<SessionId>,
    pub session_expires_at: Option<Timestamp>,
    pub is_active: bool,
    /// Count of prior COMPLETED transactions to this recipient; drives the
    /// anomaly detector's "verified recipient" multiplier.
    pub transaction_count: u64,
}

// ── Transaction ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub sequence_number: SequenceNumber,
    pub transaction_hash: String,
    pub sender_account_id: String,
    pub receiver_account_id: Option<String>,
    pub sender_idx: Idx,
    pub receiver_idx: Idx,
    pub sender_session_id: SessionId,
    pub receiver_session_id: Option<SessionId>,
    pub amount: Amount,
    pub fee: Amount,
    pub miner_fee: Amount,
    pub bank_fee: Amount,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub batch_id: Option<String>,
    pub public_block_index: Option<u64>,
    pub private_block_index: Option<u64>,
    pub commitment: String,
    pub nullifier: String,
    pub encrypted_data: Option<String>,
    pub encrypted_key: Option<String>,
    pub anomaly_score: Option<f64>,
    pub anomaly_flags: Vec<String>,
    pub requires_investigation: bool,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub flagged_at: Option<Timestamp>,
}

// ── TransactionBatch ─────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionBatch {
    pub batch_id: String,
    pub sequence_start: SequenceNumber,
    pub sequence_end: SequenceNumber,
    pub transaction_count: usize,
    pub merkle_root: String,
    pub merkle_tree: Vec<u8>,
    pub status: BatchStatus,
    pub public_block_index: Option<u64>,
    pub private_block_index: Option<u64>,
    pub challenged_by: Option<String>,
}

// ── BankVotingRecord ─────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BankVotingRecord {
    pub batch_id: String,
    pub bank_code: String,
    pub vote: Vote,
    pub validation_time_ms: u64,
    pub is_correct: Option<bool>,
    pub rbi_verified: bool,
    pub was_slashed: bool,
    pub slash_amount: Amount,
    pub challenged_by: Option<String>,
    pub group_signature: Option<String>,
}

// ── BlockPublic ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockPublic {
    pub block_index: u64,
    pub block_hash: String,
    pub previous_hash: String,
    pub transactions: Vec<String>,
    pub nonce: u64,
    pub difficulty: u8,
    pub timestamp: Timestamp,
    pub mined_by: String,
}

// ── BlockPrivate ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockPrivate {
    pub block_index: u64,
    pub block_hash: String,
    pub linked_public_block: u64,
    pub encrypted_data: String,
    pub consensus_votes: u32,
    pub consensus_achieved: bool,
}

// ── Judge ────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Judge {
    pub judge_id: String,
    pub full_name: String,
    pub court_name: String,
    pub jurisdiction: String,
    pub is_active: bool,
    pub public_key: String,
}

// ── CourtOrder ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CourtOrder {
    pub order_id: String,
    pub judge_id: String,
    pub target_idx: Idx,
    pub reason: String,
    pub case_number: String,
    pub status: CourtOrderStatus,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
    pub executed_at: Option<Timestamp>,
    pub access_granted: bool,
    pub company_key_issued: bool,
}

// ── Treasury ─────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TreasuryEntry {
    pub entry_type: TreasuryEntryType,
    pub amount: Amount,
    pub bank_code: String,
    pub fiscal_year: FiscalYear,
    pub reason: String,
    pub offense_count: Option<u32>,
    pub honest_verification_count: Option<u64>,
    pub created_at: Timestamp,
}

// ── AuditLog ─────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub seq: u64,
    pub event_type: String,
    pub event_data: String,
    pub timestamp: Timestamp,
    pub prev_hash: String,
    pub entry_hash: String,
}
