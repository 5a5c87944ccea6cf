use serde::{Deserialize, Serialize};
use std::fmt;

/// Monetary amount in the smallest integer unit (paise). Integer arithmetic
/// only — fee math in `constants` operates on this, never on floats.
pub type Amount = i64;

/// Unix timestamp (seconds, UTC).
pub type Timestamp = i64;

/// Monotonically increasing, database-enforced replay guard.
pub type SequenceNumber = i64;

// ── Idx ──────────────────────────────────────────────────────────────────────

/// A permanent, anonymous identifier: `IDX_` followed by 64 hex chars
/// (SHA-256 of `PAN:RBI:PEPPER`). Never mutates once issued.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Idx(pub String);

impl Idx {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Idx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Idx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tail = self.0.get(..12).unwrap_or(&self.0);
        write!(f, "Idx({tail}…)")
    }
}

// ── SessionId ────────────────────────────────────────────────────────────────

/// A 24-hour rotating token bound to exactly one (user, bank account) pair.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tail = self.0.get(..16).unwrap_or(&self.0);
        write!(f, "SessionId({tail}…)")
    }
}

// ── TransactionType ──────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    Domestic,
    TravelDeposit,
    TravelWithdrawal,
    TravelTransfer,
}

impl TransactionType {
    /// Travel flows (cross-border) take the 2-of-2 sender/receiver-bank
    /// consensus path instead of the 12-bank domestic path.
    pub fn is_travel(&self) -> bool {
        !matches!(self, TransactionType::Domestic)
    }
}

// ── TransactionStatus ────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    AwaitingReceiver,
    Mining,
    PublicConfirmed,
    PrivateConfirmed,
    Completed,
    Rejected,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed
                | TransactionStatus::Rejected
                | TransactionStatus::Failed
        )
    }
}

// ── BatchStatus ──────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    Pending,
    Building,
    Ready,
    Mining,
    Completed,
    Failed,
}

// ── Vote ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vote {
    Approve,
    Reject,
}

// ── CourtOrderStatus ─────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CourtOrderStatus {
    Pending,
    Executed,
    Expired,
    Denied,
}

// ── TreasuryEntryType ────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreasuryEntryType {
    Slash,
    Reward,
}

// ── FiscalYear ───────────────────────────────────────────────────────────────

/// India convention: April–March, formatted `"{start}-{start+1}"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FiscalYear(pub String);

impl FiscalYear {
    /// Derive the fiscal year containing `unix_seconds`.
    pub fn containing(unix_seconds: Timestamp) -> Self {
        use chrono::{Datelike, TimeZone, Utc};
        let dt = Utc.timestamp_opt(unix_seconds, 0).single().unwrap_or_else(Utc::now);
        let year = dt.year();
        if dt.month() >= 4 {
            FiscalYear(format!("{year}-{}", year + 1))
        } else {
            FiscalYear(format!("{}-{year}", year - 1))
        }
    }
}

impl fmt::Display for FiscalYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
