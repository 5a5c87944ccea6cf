//! PMLA-style (Prevention of Money Laundering Act, India) anomaly scorer.
//!
//! Ported from `original_source/core/services/anomaly_detection_engine.py`:
//! three additive factors (amount tier, velocity, structuring) capped at
//! 100, then multiplicative context adjustments (business account,
//! verified recipient, within-historical-range) with a 10%-of-base floor.
//! Score >= 65 flags the transaction for investigation.

use bl_core::constants::{
    ANOMALY_FLAG_THRESHOLD, ANOMALY_SCORE_FLOOR_DEN, ANOMALY_SCORE_FLOOR_NUM,
    HIGH_VALUE_TIER_1_PAISE, HIGH_VALUE_TIER_2_PAISE, PMLA_MANDATORY_REPORTING_PAISE,
    STRUCTURING_PROXIMITY_DEN, STRUCTURING_PROXIMITY_NUM, VELOCITY_HIGH_1H, VELOCITY_HIGH_24H,
    VELOCITY_HIGH_7D,
};
use bl_core::entities::{AccountType, Transaction};
use bl_core::error::BlError;
use bl_core::types::Timestamp;
use bl_ledger::LedgerStore;

const STRUCTURING_WINDOW_SECONDS: i64 = 24 * 60 * 60;
const HISTORICAL_WINDOW_SECONDS: i64 = 90 * 24 * 60 * 60;

const HOUR_SECONDS: i64 = 60 * 60;
const DAY_SECONDS: i64 = 24 * HOUR_SECONDS;

#[derive(Clone, Debug, PartialEq)]
pub struct AnomalyResult {
    pub score: f64,
    pub flags: Vec<String>,
    pub requires_investigation: bool,
}

/// Evaluate `tx` against the sender's transaction history. Read-only: the
/// caller (the engine's confirmation path) is responsible for writing
/// `anomaly_score`/`anomaly_flags`/`requires_investigation`/`flagged_at`
/// back onto the transaction row.
pub fn evaluate(store: &LedgerStore, tx: &Transaction, now: Timestamp) -> Result<AnomalyResult, BlError> {
    let mut score = 0.0;
    let mut flags = Vec::new();

    let (amount_score, mut amount_flags) = evaluate_amount_risk(tx.amount);
    score += amount_score;
    flags.append(&mut amount_flags);

    let sender_history: Vec<Transaction> = store
        .iter_transactions_by_sender(&tx.sender_idx)?
        .into_iter()
        .filter(|t| t.transaction_hash != tx.transaction_hash)
        .collect();

    let (velocity_score, mut velocity_flags) = evaluate_velocity_risk(&sender_history, now);
    score += velocity_score;
    flags.append(&mut velocity_flags);

    let (structuring_score, mut structuring_flags) =
        evaluate_structuring_risk(tx.amount, &sender_history, now);
    score += structuring_score;
    flags.append(&mut structuring_flags);

    score = score.min(100.0);
    let original_score = score;
    score = apply_context_adjustments(store, tx, score, &sender_history, now)?;

    let floor = original_score * (ANOMALY_SCORE_FLOOR_NUM / ANOMALY_SCORE_FLOOR_DEN);
    if score < floor {
        score = floor;
    }

    let requires_investigation = score >= ANOMALY_FLAG_THRESHOLD;
    Ok(AnomalyResult {
        score,
        flags,
        requires_investigation,
    })
}

/// Amount-tier risk: 0-40 points.
fn evaluate_amount_risk(amount: i64) -> (f64, Vec<String>) {
    if amount >= HIGH_VALUE_TIER_2_PAISE {
        (
            40.0,
            vec!["HIGH_VALUE_TIER_2".to_string(), "PMLA_MANDATORY_REPORTING".to_string()],
        )
    } else if amount >= HIGH_VALUE_TIER_1_PAISE {
        (
            25.0,
            vec!["HIGH_VALUE_TIER_1".to_string(), "PMLA_MANDATORY_REPORTING".to_string()],
        )
    } else if amount >= PMLA_MANDATORY_REPORTING_PAISE {
        (10.0, vec!["PMLA_MANDATORY_REPORTING".to_string()])
    } else {
        (0.0, vec![])
    }
}

/// Velocity risk: 0-30 points. Windows are disjoint — only the highest
/// priority (narrowest) window that trips fires.
fn evaluate_velocity_risk(history: &[Transaction], now: Timestamp) -> (f64, Vec<String>) {
    let count_1h = history.iter().filter(|t| now - t.created_at < HOUR_SECONDS).count();
    let count_24h = history.iter().filter(|t| now - t.created_at < DAY_SECONDS).count();
    let count_7d = history.iter().filter(|t| now - t.created_at < 7 * DAY_SECONDS).count();

    if count_1h as u32 >= VELOCITY_HIGH_1H {
        (30.0, vec![format!("HIGH_VELOCITY_1H_{count_1h}")])
    } else if count_24h as u32 >= VELOCITY_HIGH_24H {
        (15.0, vec![format!("HIGH_VELOCITY_24H_{count_24h}")])
    } else if count_7d as u32 >= VELOCITY_HIGH_7D {
        (10.0, vec![format!("HIGH_VELOCITY_7D_{count_7d}")])
    } else {
        (0.0, vec![])
    }
}

/// Structuring risk: 0-30 points. Fires when the current transaction sits
/// just below the PMLA threshold and similar transactions exist in the
/// trailing 24h window.
fn evaluate_structuring_risk(amount: i64, history: &[Transaction], now: Timestamp) -> (f64, Vec<String>) {
    let threshold = PMLA_MANDATORY_REPORTING_PAISE;
    let proximity_floor = (threshold * STRUCTURING_PROXIMITY_NUM) / STRUCTURING_PROXIMITY_DEN;

    if amount < proximity_floor || amount >= threshold {
        return (0.0, vec![]);
    }

    let recent_similar = history
        .iter()
        .filter(|t| {
            now - t.created_at < STRUCTURING_WINDOW_SECONDS
                && t.amount >= proximity_floor
                && t.amount < threshold
        })
        .count();

    if recent_similar > 0 {
        (30.0, vec![format!("STRUCTURING_DETECTED_{}_TXS", recent_similar + 1)])
    } else {
        (0.0, vec![])
    }
}

/// Multiplicative context adjustments: business account (×0.6), verified
/// recipient with 10+ prior completed transactions (×0.5), within 2x of
/// the sender's 90-day historical max (×0.7). Order matters — each
/// multiplies the running score, mirroring the Python original.
fn apply_context_adjustments(
    store: &LedgerStore,
    tx: &Transaction,
    mut score: f64,
    sender_history: &[Transaction],
    now: Timestamp,
) -> Result<f64, BlError> {
    let sender_account = match store.get_account(&tx.sender_account_id)? {
        Some(acc) => acc,
        None => return Ok(score),
    };

    if sender_account.account_type == AccountType::Business {
        score *= 0.6;
    }

    if let Some(recipient) = store.get_recipient_by_idx_pair(&tx.sender_idx, &tx.receiver_idx)? {
        if recipient.is_active && recipient.transaction_count > 10 {
            score *= 0.5;
        }
    }

    let historical_max = sender_history
        .iter()
        .filter(|t| now - t.created_at < HISTORICAL_WINDOW_SECONDS)
        .map(|t| t.amount)
        .max();

    if let Some(max_amount) = historical_max {
        if tx.amount <= max_amount.saturating_mul(2) {
            score *= 0.7;
        }
    }

    Ok(score)
}
