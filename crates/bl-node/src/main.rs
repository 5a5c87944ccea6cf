//! bl-node — the ledger core's demonstration node binary.
//!
//! Startup sequence:
//!   1. Open the state database and the split master key.
//!   2. Spawn the background worker topology: session rotation, PoW
//!      mining, BFT validation, and RBI re-audit.
//!   3. Run until interrupted.
//!
//! There is no P2P or RPC surface here (see SPEC_FULL.md's Non-goals) —
//! this binary exercises the worker topology directly against one
//! `LedgerStore`, the way `chronx-node` exercises its engine directly
//! once P2P/RPC are stripped away.

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};

use bl_consensus::{
    attempt_mine, build_next_batch, distribute_rewards, run_audit, run_consensus, submit_block,
    DistributionOutcome, MiningCoordinator,
};
use bl_core::events::{EventBus, LedgerEvent};
use bl_core::types::FiscalYear;
use bl_crypto::keymgr::{KeyManager, COMPANY_KEY, RBI_MASTER_KEY};
use bl_ledger::{LedgerStore, LockTable};

use config::NodeConfig;

#[derive(Parser, Debug)]
#[command(name = "bl-node", version, about = "Ledger core demonstration node")]
struct Args {
    /// Directory for the persistent state database. Overrides BL_DATA_DIR.
    #[arg(long)]
    data_dir: Option<std::path::PathBuf>,
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,bl_node=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let mut cfg = NodeConfig::from_env();
    if let Some(dir) = args.data_dir {
        cfg.data_dir = dir;
    }
    info!(data_dir = %cfg.data_dir.display(), "bl-node starting");

    std::fs::create_dir_all(&cfg.data_dir)
        .with_context(|| format!("creating data dir {}", cfg.data_dir.display()))?;
    let store = Arc::new(LedgerStore::open(&cfg.data_dir).context("opening ledger store")?);
    let locks = Arc::new(LockTable::new());
    let event_bus = EventBus::new();

    let keymgr = Arc::new(KeyManager::new());
    seed_master_key_halves(&keymgr, &cfg.application_pepper);

    let coordinator = Arc::new(MiningCoordinator::new());

    let (block_mined_tx, block_mined_rx) = mpsc::unbounded_channel::<(u64, String)>();
    event_bus.subscribe("block_mined", {
        let sender = block_mined_tx.clone();
        move |event| {
            if let LedgerEvent::BlockMined { block_index, batch_id } = event {
                let _ = sender.send((*block_index, batch_id.clone()));
            }
        }
    });

    let mut workers = Vec::new();
    workers.push(tokio::spawn(session_rotation_worker(
        Arc::clone(&store),
        cfg.session_rotation_hours,
    )));
    workers.push(tokio::spawn(mining_worker(
        Arc::clone(&store),
        Arc::clone(&coordinator),
        event_bus.clone(),
        cfg.pow_difficulty,
        cfg.max_miners,
        cfg.mining_timeout_seconds,
    )));
    workers.push(tokio::spawn(validator_worker(
        Arc::clone(&store),
        Arc::clone(&locks),
        Arc::clone(&keymgr),
        event_bus.clone(),
        block_mined_rx,
    )));
    workers.push(tokio::spawn(rbi_audit_worker(Arc::clone(&store))));
    workers.push(tokio::spawn(reward_distribution_worker(Arc::clone(&store))));

    info!("node ready — session rotation, mining, validation, and audit workers running");
    for worker in workers {
        if let Err(e) = worker.await {
            warn!(error = %e, "background worker panicked");
        }
    }
    Ok(())
}

/// Seed the global master key's two halves. A deployed node would load
/// `RBI_MASTER_KEY`'s half from the regulator's key-store and derive
/// `COMPANY_KEY`'s half locally; absent either from the environment this
/// generates an ephemeral half, same caveat as the teacher's ephemeral
/// genesis keys: not reproducible, local development only.
fn seed_master_key_halves(keymgr: &KeyManager, application_pepper: &str) {
    match std::env::var("RBI_MASTER_KEY_HALF_HEX").ok().and_then(|h| hex::decode(h).ok()) {
        Some(bytes) => keymgr.seed(RBI_MASTER_KEY, bytes, now()),
        None => {
            warn!("no RBI_MASTER_KEY_HALF_HEX set — generating an ephemeral half, DO NOT USE IN PRODUCTION");
            keymgr.generate(RBI_MASTER_KEY, 32, now());
        }
    }
    let company_half = bl_crypto::sha256_bytes(application_pepper.as_bytes()).to_vec();
    keymgr.seed(COMPANY_KEY, company_half, now());
}

/// Hourly (by default) pass over every session, deactivating expired ones.
async fn session_rotation_worker(store: Arc<LedgerStore>, rotation_hours: i64) {
    let mut interval = tokio::time::interval(Duration::from_secs((rotation_hours * 3600) as u64));
    loop {
        interval.tick().await;
        let t = now();
        match store.iter_sessions() {
            Ok(mut sessions) => {
                let rotated = bl_identity::session::rotate_expired(&mut sessions, t);
                if rotated.is_empty() {
                    continue;
                }
                for session in &sessions {
                    if rotated.contains(&session.session_id) {
                        if let Err(e) = store.put_session(session) {
                            warn!(error = %e, "failed to persist rotated session");
                        }
                    }
                }
                info!(count = rotated.len(), "sessions rotated out");
            }
            Err(e) => warn!(error = %e, "session rotation scan failed"),
        }
    }
}

/// Batch-build-then-mine loop: assembles the next pending batch, races
/// `max_miners` blocking PoW workers against the shared tip generation
/// counter, submits the first solution found, and publishes `BlockMined`
/// so the validator worker can run consensus on it.
async fn mining_worker(
    store: Arc<LedgerStore>,
    coordinator: Arc<MiningCoordinator>,
    event_bus: EventBus,
    difficulty: u8,
    max_miners: usize,
    mining_timeout_seconds: u64,
) {
    const BATCH_ID_PREFIX: &str = "batch";
    let mut batch_counter: u64 = 0;
    loop {
        let batch = match build_next_batch(&store, &format!("{BATCH_ID_PREFIX}-{batch_counter}")) {
            Ok(Some(batch)) => batch,
            Ok(None) => {
                tokio::time::sleep(Duration::from_secs(2)).await;
                continue;
            }
            Err(e) => {
                warn!(error = %e, "batch assembly failed");
                tokio::time::sleep(Duration::from_secs(2)).await;
                continue;
            }
        };
        batch_counter += 1;

        let mut miners = tokio::task::JoinSet::new();
        for worker_id in 0..max_miners.max(1) {
            let store = Arc::clone(&store);
            let coordinator = Arc::clone(&coordinator);
            let batch = batch.clone();
            let miner_id = format!("miner-{worker_id}");
            let t = now();
            miners.spawn_blocking(move || attempt_mine(&store, &batch, difficulty, &coordinator, &miner_id, t));
        }

        let deadline = tokio::time::sleep(Duration::from_secs(mining_timeout_seconds));
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                maybe_result = miners.join_next() => {
                    let Some(result) = maybe_result else { break };
                    match result {
                        Ok(Ok(Some(block))) => {
                            let block_index = block.block_index;
                            match submit_block(&store, &coordinator, block, now()) {
                                Ok(_) => {
                                    event_bus.publish(LedgerEvent::BlockMined {
                                        block_index,
                                        batch_id: batch.batch_id.clone(),
                                    });
                                }
                                Err(e) => warn!(error = %e, "mined block rejected on submission"),
                            }
                            break;
                        }
                        Ok(Ok(None)) => {}
                        Ok(Err(e)) => warn!(error = %e, "miner task failed"),
                        Err(e) => warn!(error = %e, "miner task panicked"),
                    }
                }
                _ = &mut deadline => {
                    warn!(batch_id = %batch.batch_id, "mining round timed out, abandoning batch attempt");
                    break;
                }
            }
        }
        miners.abort_all();
    }
}

/// Wakes on every `BlockMined` event and runs BFT consensus for the batch
/// it belongs to.
async fn validator_worker(
    store: Arc<LedgerStore>,
    locks: Arc<LockTable>,
    keymgr: Arc<KeyManager>,
    event_bus: EventBus,
    mut block_mined_rx: mpsc::UnboundedReceiver<(u64, String)>,
) {
    while let Some((block_index, batch_id)) = block_mined_rx.recv().await {
        let mut batch = match store.get_batch(&batch_id) {
            Ok(Some(batch)) => batch,
            Ok(None) => {
                warn!(batch_id, "block_mined event for unknown batch");
                continue;
            }
            Err(e) => {
                warn!(error = %e, "batch lookup failed");
                continue;
            }
        };

        match run_consensus(&store, &locks, &keymgr, &mut batch, block_index, now()) {
            Ok(outcome) => {
                event_bus.publish(LedgerEvent::Consensus {
                    batch_id: outcome.batch_id.clone(),
                    approvals: outcome.domestic_approvals,
                });
                for hash in &outcome.settled {
                    event_bus.publish(LedgerEvent::TransactionCompleted {
                        transaction_hash: hash.clone(),
                    });
                }
            }
            Err(e) => warn!(error = %e, batch_id, "consensus run failed"),
        }
    }
}

/// RBI's independent re-audit, run once per day against a sample of
/// settled batches (see `bl_consensus::rbi`).
async fn rbi_audit_worker(store: Arc<LedgerStore>) {
    let mut interval = tokio::time::interval(Duration::from_secs(24 * 3600));
    loop {
        interval.tick().await;
        match run_audit(&store, now()) {
            Ok(report) => info!(
                batches_audited = report.batches_audited,
                slashed = report.banks_slashed.len(),
                deactivated = report.banks_deactivated.len(),
                "RBI audit pass complete"
            ),
            Err(e) => warn!(error = %e, "RBI audit pass failed"),
        }
    }
}

/// Checks once a day whether the previous fiscal year's reward pool still
/// needs distributing; `distribute_rewards` is idempotent per fiscal
/// year, so a redundant tick is harmless.
async fn reward_distribution_worker(store: Arc<LedgerStore>) {
    let mut interval = tokio::time::interval(Duration::from_secs(24 * 3600));
    loop {
        interval.tick().await;
        let t = now();
        let fiscal_year = FiscalYear::containing(t);
        match distribute_rewards(&store, &fiscal_year, t) {
            Ok(DistributionOutcome::Distributed(shares)) => {
                info!(fiscal_year = %fiscal_year.0, banks_paid = shares.len(), "fiscal year rewards distributed");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "reward distribution failed"),
        }
    }
}
