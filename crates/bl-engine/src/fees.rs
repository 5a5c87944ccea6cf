//! Fee schedule: `miner_fee = 0.5%·amount`, `bank_fee = 1%·amount`,
//! `fee = miner_fee + bank_fee`. Integer basis-points arithmetic — `Amount`
//! is the smallest currency unit, so this never drifts the way the
//! source's `Decimal` multiplication by `0.005`/`0.01` would under a float
//! representation.

use bl_core::constants::{BANK_FEE_RATE_BPS, FEE_RATE_DENOMINATOR, MINER_FEE_RATE_BPS};
use bl_core::types::Amount;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeeBreakdown {
    pub miner_fee: Amount,
    pub bank_fee: Amount,
    pub fee: Amount,
}

pub fn compute(amount: Amount) -> FeeBreakdown {
    let miner_fee = (amount * MINER_FEE_RATE_BPS) / FEE_RATE_DENOMINATOR;
    let bank_fee = (amount * BANK_FEE_RATE_BPS) / FEE_RATE_DENOMINATOR;
    FeeBreakdown {
        miner_fee,
        bank_fee,
        fee: miner_fee + bank_fee,
    }
}

/// Split `bank_fee` equally across `bank_codes`, in iteration order. Any
/// remainder from integer division is credited to the first bank in the
/// list so the sum of shares always equals `bank_fee` exactly.
pub fn split_domestic<'a>(bank_fee: Amount, bank_codes: &'a [String]) -> Vec<(&'a str, Amount)> {
    if bank_codes.is_empty() {
        return vec![];
    }
    let n = bank_codes.len() as Amount;
    let share = bank_fee / n;
    let remainder = bank_fee - share * n;
    bank_codes
        .iter()
        .enumerate()
        .map(|(i, code)| {
            let extra = if i == 0 { remainder } else { 0 };
            (code.as_str(), share + extra)
        })
        .collect()
}

/// Split `bank_fee` equally between the sender's and receiver's bank
/// (travel transfers). Any odd paise goes to the sender's bank.
pub fn split_travel(bank_fee: Amount) -> (Amount, Amount) {
    let share = bank_fee / 2;
    let remainder = bank_fee - share * 2;
    (share + remainder, share)
}
