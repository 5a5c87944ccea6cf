pub mod batch;
pub mod miner;
pub mod rbi;
pub mod rewards;
pub mod validator;

pub use batch::build_next_batch;
pub use miner::{attempt_mine, default_difficulty, submit_block, MiningCoordinator};
pub use rbi::{run_audit, RbiAuditReport};
pub use rewards::{distribute as distribute_rewards, DistributionOutcome};
pub use validator::{run_consensus, BatchConsensusOutcome};
