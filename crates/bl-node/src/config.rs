//! Environment-driven node configuration. Reads every knob spec.md §6
//! names; this is the only place in the workspace that touches `std::env`
//! (core crates take these as constructor parameters instead).

use std::path::PathBuf;

use bl_core::constants::{DEFAULT_POW_DIFFICULTY, DEFAULT_SESSION_ROTATION_HOURS};

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub data_dir: PathBuf,
    pub application_pepper: String,
    pub pow_difficulty: u8,
    pub session_rotation_hours: i64,
    pub pow_miner_fee_rate_bps: i64,
    pub bank_consensus_fee_rate_bps: i64,
    pub ddos_threshold: u32,
    pub ddos_block_duration_minutes: i64,
    pub mining_timeout_seconds: u64,
    pub max_miners: usize,
}

impl NodeConfig {
    /// Load from the environment, falling back to spec.md §6 defaults for
    /// anything unset.
    pub fn from_env() -> Self {
        Self {
            data_dir: std::env::var("BL_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./bl-data")),
            application_pepper: std::env::var("APPLICATION_PEPPER")
                .unwrap_or_else(|_| "dev-pepper-do-not-use-in-production".to_string()),
            pow_difficulty: env_or("POW_DIFFICULTY", DEFAULT_POW_DIFFICULTY),
            session_rotation_hours: env_or("SESSION_ROTATION_HOURS", DEFAULT_SESSION_ROTATION_HOURS),
            pow_miner_fee_rate_bps: env_or("POW_MINER_FEE_RATE", 50),
            bank_consensus_fee_rate_bps: env_or("BANK_CONSENSUS_FEE_RATE", 100),
            ddos_threshold: env_or("DDOS_THRESHOLD", 20),
            ddos_block_duration_minutes: env_or("DDOS_BLOCK_DURATION_MINUTES", 15),
            mining_timeout_seconds: env_or("MINING_TIMEOUT_SECONDS", 30),
            max_miners: env_or("MAX_MINERS", 4),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_when_unset() {
        // SAFETY (test-only): no other test in this binary reads these vars
        // concurrently; `cargo test` runs this crate's tests single-threaded
        // by default for env-mutating tests in the same module.
        std::env::remove_var("POW_DIFFICULTY");
        let cfg = NodeConfig::from_env();
        assert_eq!(cfg.pow_difficulty, DEFAULT_POW_DIFFICULTY);
        assert_eq!(cfg.session_rotation_hours, DEFAULT_SESSION_ROTATION_HOURS);
    }
}
