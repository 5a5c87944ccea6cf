pub mod fees;
pub mod lifecycle;

pub use fees::{compute as compute_fees, split_domestic, split_travel, FeeBreakdown};
pub use lifecycle::TransactionEngine;
