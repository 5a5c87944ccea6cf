//! ─── Ledger protocol constants ──────────────────────────────────────────────
//!
//! Fee rates, consensus thresholds, and escalating slashing percentages as
//! fixed by the spec; environment overrides (where the spec allows them) are
//! applied at the `bl-node` boundary, not here.

// ── Fees ─────────────────────────────────────────────────────────────────────

/// Miner fee rate: 0.5% of the transfer amount.
pub const MINER_FEE_RATE_BPS: i64 = 50; // basis points, /10_000
/// Bank (consensus) fee rate: 1% of the transfer amount.
pub const BANK_FEE_RATE_BPS: i64 = 100;
pub const FEE_RATE_DENOMINATOR: i64 = 10_000;

// ── Consortium / consensus ────────────────────────────────────────────────────

/// Total consortium banks defined at genesis.
pub const CONSORTIUM_SIZE: usize = 12;
/// Domestic consensus threshold: 10 of 12 (83%).
pub const DOMESTIC_CONSENSUS_THRESHOLD: u32 = 10;
/// Travel consensus is 2-of-2 unanimous (sender bank + receiver bank).
pub const TRAVEL_CONSENSUS_REQUIRED: u32 = 2;

/// Fraction of initial stake below which a bank is deactivated.
pub const DEACTIVATION_THRESHOLD_NUM: i64 = 30;
pub const DEACTIVATION_THRESHOLD_DEN: i64 = 100;

// ── Slashing (escalating per-bank-lifetime offense count) ────────────────────

pub const SLASH_FIRST_OFFENSE_BPS: i64 = 500; // 5%
pub const SLASH_SECOND_OFFENSE_BPS: i64 = 1_000; // 10%
pub const SLASH_THIRD_PLUS_OFFENSE_BPS: i64 = 2_000; // 20%

/// Returns the slash percentage (in basis points of current stake) for the
/// given lifetime offense count (1-indexed: this is the Nth offense).
pub fn slash_bps_for_offense(offense_number: u32) -> i64 {
    match offense_number {
        0 => 0,
        1 => SLASH_FIRST_OFFENSE_BPS,
        2 => SLASH_SECOND_OFFENSE_BPS,
        _ => SLASH_THIRD_PLUS_OFFENSE_BPS,
    }
}

// ── Batching ─────────────────────────────────────────────────────────────────

pub const MAX_BATCH_SIZE: usize = 100;

// ── RBI re-audit ─────────────────────────────────────────────────────────────

/// Percentage of eligible batches the RBI samples for independent re-audit.
pub const RBI_SAMPLE_PERCENT: u32 = 10;

// ── PoW ──────────────────────────────────────────────────────────────────────

/// Default PoW difficulty: number of leading hex zero digits required.
pub const DEFAULT_POW_DIFFICULTY: u8 = 4;

// ── Sessions ─────────────────────────────────────────────────────────────────

pub const DEFAULT_SESSION_ROTATION_HOURS: i64 = 24;

// ── Disclosure ───────────────────────────────────────────────────────────────

pub const COURT_ORDER_VALIDITY_HOURS: i64 = 24;
pub const COMPANY_KEY_ROTATION_HOURS: i64 = 24;

// ── Anomaly detection (PMLA-style) ────────────────────────────────────────────

pub const ANOMALY_FLAG_THRESHOLD: f64 = 65.0;

pub const PMLA_MANDATORY_REPORTING_PAISE: i64 = 1_000_000_00; // ₹10,00,000
pub const HIGH_VALUE_TIER_1_PAISE: i64 = 5_000_000_00; // ₹50,00,000
pub const HIGH_VALUE_TIER_2_PAISE: i64 = 10_000_000_00; // ₹1,00,00,000

pub const VELOCITY_HIGH_1H: u32 = 5;
pub const VELOCITY_HIGH_24H: u32 = 10;
pub const VELOCITY_HIGH_7D: u32 = 50;

pub const STRUCTURING_PROXIMITY_NUM: i64 = 95;
pub const STRUCTURING_PROXIMITY_DEN: i64 = 100;

/// Floor applied after multiplicative context adjustments: the final score
/// can never drop below 10% of the pre-multiplier base score.
pub const ANOMALY_SCORE_FLOOR_NUM: f64 = 10.0;
pub const ANOMALY_SCORE_FLOOR_DEN: f64 = 100.0;

// ── PBKDF2 / cipher parameters ─────────────────────────────────────────────────

pub const PBKDF2_ITERATIONS: u32 = 100_000;
pub const PBKDF2_SALT: &[u8] = b"IDX_CRYPTO_BANKING_SALT";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_escalation() {
        assert_eq!(slash_bps_for_offense(1), 500);
        assert_eq!(slash_bps_for_offense(2), 1_000);
        assert_eq!(slash_bps_for_offense(3), 2_000);
        assert_eq!(slash_bps_for_offense(10), 2_000);
    }
}
