use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlError {
    // ── Identity & session errors ────────────────────────────────────────────
    #[error("invalid identity format: {0}")]
    InvalidIdentityFormat(String),

    #[error("unknown user: {0}")]
    UnknownUser(String),

    #[error("unknown account: {0}")]
    UnknownAccount(String),

    #[error("unknown session: {0}")]
    UnknownSession(String),

    #[error("unknown recipient: {0}")]
    UnknownRecipient(String),

    #[error("session expired at {expired_at}")]
    SessionExpired { expired_at: i64 },

    // ── Transaction lifecycle errors ─────────────────────────────────────────
    #[error("account is frozen: {0}")]
    AccountFrozen(String),

    #[error("insufficient balance: need {need}, have {have}")]
    InsufficientBalance { need: i64, have: i64 },

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("duplicate transaction: {0}")]
    DuplicateTransaction(String),

    #[error("invalid state transition from {from:?} via {action}")]
    InvalidStateTransition { from: String, action: String },

    #[error("unknown transaction: {0}")]
    UnknownTransaction(String),

    // ── Consensus errors ──────────────────────────────────────────────────────
    #[error("consensus failed: {approvals}/{required} approvals")]
    ConsensusFailed { approvals: u32, required: u32 },

    #[error("block invalid: {0}")]
    BlockInvalid(String),

    #[error("batch too large: {count} transactions (max {max})")]
    BatchTooLarge { count: usize, max: usize },

    #[error("unknown bank: {0}")]
    UnknownBank(String),

    #[error("bank already voted on batch {batch_id}")]
    DuplicateVote { batch_id: String },

    // ── Disclosure errors ─────────────────────────────────────────────────────
    #[error("unknown judge: {0}")]
    UnknownJudge(String),

    #[error("judge is inactive: {0}")]
    JudgeInactive(String),

    #[error("court order expired at {expired_at}")]
    OrderExpired { expired_at: i64 },

    #[error("court order not found: {0}")]
    UnknownOrder(String),

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("MAC verification failed — ciphertext has been tampered with")]
    MacMismatch,

    // ── Key management errors ─────────────────────────────────────────────────
    #[error("key missing: {0}")]
    KeyMissing(String),

    #[error("key issuance denied: {0}")]
    KeyIssuanceDenied(String),

    // ── Ledger / storage errors ───────────────────────────────────────────────
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("lock poisoned for key {0}")]
    LockPoisoned(String),

    // ── Rate limiting ──────────────────────────────────────────────────────────
    #[error("rate limited: {key} blocked until {blocked_until}")]
    RateLimited { key: String, blocked_until: i64 },

    // ── General ────────────────────────────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, BlError>;
