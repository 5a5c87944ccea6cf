//! Fiscal-year reward distribution (spec.md §4.3.5). Once a fiscal year
//! (April-March) closes, the pool of stake collected from that year's
//! slashes is redistributed to domestic consortium banks in proportion to
//! their honest re-audited verifications.
//!
//! `available = ΣSLASH(fy) − ΣREWARD(fy)`; each bank's share is
//! `available · honest_verifications(bank) / Σhonest_verifications`.
//! Distribution is computed in full before any write lands, so a failed
//! write midway never leaves a partial payout — see `distribute` below.

use bl_core::entities::TreasuryEntry;
use bl_core::error::BlError;
use bl_core::types::{FiscalYear, Timestamp, TreasuryEntryType};
use bl_ledger::LedgerStore;
use tracing::info;

/// One bank's computed share of a fiscal year's reward pool.
#[derive(Debug, Clone)]
pub struct RewardShare {
    pub bank_code: String,
    pub amount: i64,
    pub honest_verifications: u64,
}

/// Outcome of a distribution attempt.
#[derive(Debug)]
pub enum DistributionOutcome {
    /// Pool and participant set computed, nothing to distribute (empty
    /// pool or no honest verifications recorded this year).
    Empty,
    /// Already distributed for this fiscal year — refuses to double-pay.
    AlreadyDistributed,
    /// Rewards were computed and persisted.
    Distributed(Vec<RewardShare>),
}

fn pool_for_fiscal_year(store: &LedgerStore, fiscal_year: &FiscalYear) -> Result<i64, BlError> {
    let mut slashed = 0i64;
    let mut rewarded = 0i64;
    for entry in store.iter_treasury_for_fiscal_year(&fiscal_year.0)? {
        match entry.entry_type {
            TreasuryEntryType::Slash => slashed += entry.amount,
            TreasuryEntryType::Reward => rewarded += entry.amount,
        }
    }
    Ok(slashed - rewarded)
}

/// Compute and persist each domestic consortium bank's share of
/// `fiscal_year`'s slash pool, then reset every bank's honest/malicious
/// verification counters for the next year. No-op if this fiscal year was
/// already distributed (a bank's `last_fiscal_year_reward` already
/// matches it).
pub fn distribute(
    store: &LedgerStore,
    fiscal_year: &FiscalYear,
    now: Timestamp,
) -> Result<DistributionOutcome, BlError> {
    let banks = store.iter_domestic_consortium_banks()?;
    if banks
        .iter()
        .any(|b| b.last_fiscal_year_reward.as_ref() == Some(fiscal_year))
    {
        return Ok(DistributionOutcome::AlreadyDistributed);
    }

    let available = pool_for_fiscal_year(store, fiscal_year)?;
    let total_honest: u64 = banks.iter().map(|b| b.honest_verifications).sum();
    if available <= 0 || total_honest == 0 {
        return Ok(DistributionOutcome::Empty);
    }

    // Compute every share up front; only once every amount is known do we
    // start writing, so a mid-loop storage error never leaves a bank paid
    // while its peers are not.
    let shares: Vec<RewardShare> = banks
        .iter()
        .filter(|b| b.honest_verifications > 0)
        .map(|b| RewardShare {
            bank_code: b.bank_code.clone(),
            amount: (available as i128 * b.honest_verifications as i128 / total_honest as i128) as i64,
            honest_verifications: b.honest_verifications,
        })
        .collect();

    for share in &shares {
        let mut bank = store
            .get_bank(&share.bank_code)?
            .ok_or_else(|| BlError::Other(format!("unknown bank {}", share.bank_code)))?;
        bank.stake_amount += share.amount;
        bank.total_fees_earned += share.amount;
        bank.last_fiscal_year_reward = Some(fiscal_year.clone());
        bank.honest_verifications = 0;
        bank.malicious_verifications = 0;
        store.put_bank(&bank)?;

        store.append_treasury_entry(&TreasuryEntry {
            entry_type: TreasuryEntryType::Reward,
            amount: share.amount,
            bank_code: share.bank_code.clone(),
            fiscal_year: fiscal_year.clone(),
            reason: "fiscal year honest-verification reward".to_string(),
            offense_count: None,
            honest_verification_count: Some(share.honest_verifications),
            created_at: now,
        })?;
    }

    // Banks with zero honest verifications still close out the year.
    for bank in &banks {
        if bank.honest_verifications == 0 && bank.last_fiscal_year_reward.as_ref() != Some(fiscal_year) {
            let mut bank = bank.clone();
            bank.last_fiscal_year_reward = Some(fiscal_year.clone());
            bank.malicious_verifications = 0;
            store.put_bank(&bank)?;
        }
    }

    info!(fiscal_year = %fiscal_year.0, available, paid_banks = shares.len(), "fiscal year rewards distributed");
    Ok(DistributionOutcome::Distributed(shares))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bl_core::entities::Bank;

    fn store() -> LedgerStore {
        let dir = tempfile::tempdir().unwrap();
        LedgerStore::open(dir.path().join("db")).unwrap()
    }

    fn bank(code: &str, honest: u64) -> Bank {
        Bank {
            bank_code: code.to_string(),
            bank_name: code.to_string(),
            stake_amount: 900_000,
            initial_stake: 1_000_000,
            is_active: true,
            total_validations: honest,
            total_fees_earned: 0,
            penalty_count: 1,
            total_penalties: 100_000,
            honest_verifications: honest,
            malicious_verifications: 0,
            last_fiscal_year_reward: None,
            is_domestic_consortium_member: true,
        }
    }

    #[test]
    fn pool_splits_proportionally_to_honest_verifications() {
        let store = store();
        store.put_bank(&bank("HDFC", 30)).unwrap();
        store.put_bank(&bank("ICICI", 70)).unwrap();

        let fy = FiscalYear("2025-2026".to_string());
        store
            .append_treasury_entry(&TreasuryEntry {
                entry_type: TreasuryEntryType::Slash,
                amount: 100_000,
                bank_code: "SBI".to_string(),
                fiscal_year: fy.clone(),
                reason: "test slash".to_string(),
                offense_count: Some(1),
                honest_verification_count: None,
                created_at: 1000,
            })
            .unwrap();

        let outcome = distribute(&store, &fy, 2000).unwrap();
        let shares = match outcome {
            DistributionOutcome::Distributed(shares) => shares,
            other => panic!("expected Distributed, got {other:?}"),
        };
        assert_eq!(shares.len(), 2);
        let hdfc_share = shares.iter().find(|s| s.bank_code == "HDFC").unwrap();
        assert_eq!(hdfc_share.amount, 30_000);

        let hdfc = store.get_bank("HDFC").unwrap().unwrap();
        assert_eq!(hdfc.honest_verifications, 0);
        assert_eq!(hdfc.last_fiscal_year_reward, Some(fy));
    }

    #[test]
    fn empty_pool_distributes_nothing() {
        let store = store();
        store.put_bank(&bank("HDFC", 10)).unwrap();
        let fy = FiscalYear("2025-2026".to_string());
        let outcome = distribute(&store, &fy, 2000).unwrap();
        assert!(matches!(outcome, DistributionOutcome::Empty));
    }

    #[test]
    fn already_distributed_year_is_refused() {
        let store = store();
        let mut b = bank("HDFC", 10);
        b.last_fiscal_year_reward = Some(FiscalYear("2025-2026".to_string()));
        store.put_bank(&b).unwrap();

        let fy = FiscalYear("2025-2026".to_string());
        let outcome = distribute(&store, &fy, 2000).unwrap();
        assert!(matches!(outcome, DistributionOutcome::AlreadyDistributed));
    }
}
