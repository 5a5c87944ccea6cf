//! End-to-end lifecycle test covering spec.md §8 scenario 1 (single
//! domestic transfer, success) without the consensus/mining layers —
//! those are exercised separately in `bl-consensus`. Here we drive the
//! state machine directly from PENDING through COMPLETED.

use bl_core::entities::{AccountType, Bank, BankAccount};
use bl_core::types::{Idx, SessionId, TransactionStatus, TransactionType};
use bl_engine::TransactionEngine;
use bl_ledger::{LedgerStore, LockTable};

fn account(id: &str, idx: &str, bank: &str, balance: i64) -> BankAccount {
    BankAccount {
        id: id.to_string(),
        user_idx: Idx(idx.to_string()),
        bank_code: bank.to_string(),
        account_number: format!("{bank}-ACC"),
        balance,
        is_active: true,
        is_frozen: false,
        account_type: AccountType::Retail,
        created_at: 0,
    }
}

fn consortium_bank(code: &str) -> Bank {
    Bank {
        bank_code: code.to_string(),
        bank_name: code.to_string(),
        stake_amount: 100_000,
        initial_stake: 100_000,
        is_active: true,
        total_validations: 0,
        total_fees_earned: 0,
        penalty_count: 0,
        total_penalties: 0,
        honest_verifications: 0,
        malicious_verifications: 0,
        last_fiscal_year_reward: None,
        is_domestic_consortium_member: true,
    }
}

#[test]
fn single_domestic_transfer_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let store = LedgerStore::open(dir.path().join("db")).unwrap();
    let locks = LockTable::new();
    let engine = TransactionEngine::new(&store, &locks);

    let sender = account("acc-a", "IDX_a", "HDFC", 10_000);
    let receiver = account("acc-b", "IDX_b", "ICICI", 0);
    store.put_account_new(&sender).unwrap();
    store.put_account_new(&receiver).unwrap();

    let tx = engine
        .create(
            "acc-a",
            Some("acc-b"),
            Idx("IDX_a".to_string()),
            Idx("IDX_b".to_string()),
            SessionId("SESSION_a".to_string()),
            Some(SessionId("SESSION_b".to_string())),
            1_000,
            TransactionType::Domestic,
            1000,
        )
        .unwrap();
    assert_eq!(tx.status, TransactionStatus::Pending);
    assert_eq!(tx.fee, 15);

    let anomaly = bl_anomaly::evaluate(&store, &tx, 1000).unwrap();
    engine.start_mining(&tx.transaction_hash, anomaly, 1000).unwrap();
    engine
        .confirm_public(&tx.transaction_hash, "batch-1", 1)
        .unwrap();
    engine.confirm_private(&tx.transaction_hash, 1).unwrap();
    let completed = engine.settle(&tx.transaction_hash, 1010).unwrap();

    assert_eq!(completed.status, TransactionStatus::Completed);
    assert_eq!(completed.completed_at, Some(1010));

    let sender_after = store.get_account("acc-a").unwrap().unwrap();
    let receiver_after = store.get_account("acc-b").unwrap().unwrap();
    assert_eq!(sender_after.balance, 10_000 - 1_015);
    assert_eq!(receiver_after.balance, 1_000);
}

/// Spec.md §8 scenario 1's bank side: "each of 12 banks += 10/12" — the
/// miner's half (`miner balance += 5`) is paid at block-submission time
/// and is covered by `bl-consensus`'s miner tests, not here.
#[test]
fn settlement_distributes_bank_fee_across_domestic_consortium() {
    let dir = tempfile::tempdir().unwrap();
    let store = LedgerStore::open(dir.path().join("db")).unwrap();
    let locks = LockTable::new();
    let engine = TransactionEngine::new(&store, &locks);

    let bank_codes: Vec<String> = (0..12).map(|i| format!("BANK{i}")).collect();
    for code in &bank_codes {
        store.put_bank(&consortium_bank(code)).unwrap();
    }

    let sender = account("acc-a", "IDX_a", "BANK0", 1_000_000);
    let receiver = account("acc-b", "IDX_b", "BANK1", 0);
    store.put_account_new(&sender).unwrap();
    store.put_account_new(&receiver).unwrap();

    let tx = engine
        .create(
            "acc-a",
            Some("acc-b"),
            Idx("IDX_a".to_string()),
            Idx("IDX_b".to_string()),
            SessionId("SESSION_a".to_string()),
            Some(SessionId("SESSION_b".to_string())),
            120_000,
            TransactionType::Domestic,
            1000,
        )
        .unwrap();
    assert_eq!(tx.bank_fee, 1_200);

    let anomaly = bl_anomaly::evaluate(&store, &tx, 1000).unwrap();
    engine.start_mining(&tx.transaction_hash, anomaly, 1000).unwrap();
    engine.confirm_public(&tx.transaction_hash, "batch-1", 1).unwrap();
    engine.confirm_private(&tx.transaction_hash, 1).unwrap();
    engine.settle(&tx.transaction_hash, 1010).unwrap();

    // bank_fee 1,200 split 12 ways divides evenly, so every bank earns 100.
    for code in &bank_codes {
        let bank = store.get_bank(code).unwrap().unwrap();
        assert_eq!(bank.total_fees_earned, 100);
    }
}

#[test]
fn settlement_splits_travel_fee_between_sender_and_receiver_bank() {
    let dir = tempfile::tempdir().unwrap();
    let store = LedgerStore::open(dir.path().join("db")).unwrap();
    let locks = LockTable::new();
    let engine = TransactionEngine::new(&store, &locks);

    let mut hdfc = consortium_bank("HDFC");
    hdfc.is_domestic_consortium_member = false;
    let mut foreign = consortium_bank("FOREIGN_US_JPM");
    foreign.is_domestic_consortium_member = false;
    store.put_bank(&hdfc).unwrap();
    store.put_bank(&foreign).unwrap();

    let sender = account("acc-a", "IDX_a", "HDFC", 1_000_000);
    let receiver = account("acc-b", "IDX_b", "FOREIGN_US_JPM", 0);
    store.put_account_new(&sender).unwrap();
    store.put_account_new(&receiver).unwrap();

    let tx = engine
        .create(
            "acc-a",
            Some("acc-b"),
            Idx("IDX_a".to_string()),
            Idx("IDX_b".to_string()),
            SessionId("SESSION_a".to_string()),
            Some(SessionId("SESSION_b".to_string())),
            100_000,
            TransactionType::TravelTransfer,
            1000,
        )
        .unwrap();
    assert_eq!(tx.bank_fee, 1_000);

    let anomaly = bl_anomaly::evaluate(&store, &tx, 1000).unwrap();
    engine.start_mining(&tx.transaction_hash, anomaly, 1000).unwrap();
    engine.confirm_public(&tx.transaction_hash, "batch-1", 1).unwrap();
    engine.confirm_private(&tx.transaction_hash, 1).unwrap();
    engine.settle(&tx.transaction_hash, 1010).unwrap();

    let hdfc_after = store.get_bank("HDFC").unwrap().unwrap();
    let foreign_after = store.get_bank("FOREIGN_US_JPM").unwrap().unwrap();
    assert_eq!(hdfc_after.total_fees_earned, 500);
    assert_eq!(foreign_after.total_fees_earned, 500);
}

#[test]
fn insufficient_balance_is_rejected_at_creation() {
    let dir = tempfile::tempdir().unwrap();
    let store = LedgerStore::open(dir.path().join("db")).unwrap();
    let locks = LockTable::new();
    let engine = TransactionEngine::new(&store, &locks);

    let sender = account("acc-a", "IDX_a", "HDFC", 100);
    let receiver = account("acc-b", "IDX_b", "ICICI", 0);
    store.put_account_new(&sender).unwrap();
    store.put_account_new(&receiver).unwrap();

    let err = engine.create(
        "acc-a",
        Some("acc-b"),
        Idx("IDX_a".to_string()),
        Idx("IDX_b".to_string()),
        SessionId("SESSION_a".to_string()),
        Some(SessionId("SESSION_b".to_string())),
        1_000,
        TransactionType::Domestic,
        1000,
    );
    assert!(matches!(err, Err(bl_core::BlError::InsufficientBalance { .. })));
}

#[test]
fn frozen_sender_account_rejects_transfer() {
    let dir = tempfile::tempdir().unwrap();
    let store = LedgerStore::open(dir.path().join("db")).unwrap();
    let locks = LockTable::new();
    let engine = TransactionEngine::new(&store, &locks);

    let mut sender = account("acc-a", "IDX_a", "HDFC", 10_000);
    sender.is_frozen = true;
    let receiver = account("acc-b", "IDX_b", "ICICI", 0);
    store.put_account_new(&sender).unwrap();
    store.put_account_new(&receiver).unwrap();

    let err = engine.create(
        "acc-a",
        Some("acc-b"),
        Idx("IDX_a".to_string()),
        Idx("IDX_b".to_string()),
        SessionId("SESSION_a".to_string()),
        Some(SessionId("SESSION_b".to_string())),
        1_000,
        TransactionType::Domestic,
        1000,
    );
    assert!(matches!(err, Err(bl_core::BlError::AccountFrozen(_))));
}

#[test]
fn competing_settlement_fails_gracefully() {
    let dir = tempfile::tempdir().unwrap();
    let store = LedgerStore::open(dir.path().join("db")).unwrap();
    let locks = LockTable::new();
    let engine = TransactionEngine::new(&store, &locks);

    let sender = account("acc-a", "IDX_a", "HDFC", 1_000);
    let receiver = account("acc-b", "IDX_b", "ICICI", 0);
    store.put_account_new(&sender).unwrap();
    store.put_account_new(&receiver).unwrap();

    let tx = engine
        .create(
            "acc-a",
            Some("acc-b"),
            Idx("IDX_a".to_string()),
            Idx("IDX_b".to_string()),
            SessionId("SESSION_a".to_string()),
            Some(SessionId("SESSION_b".to_string())),
            900,
            TransactionType::Domestic,
            1000,
        )
        .unwrap();

    let anomaly = bl_anomaly::evaluate(&store, &tx, 1000).unwrap();
    engine.start_mining(&tx.transaction_hash, anomaly, 1000).unwrap();
    engine.confirm_public(&tx.transaction_hash, "batch-1", 1).unwrap();
    engine.confirm_private(&tx.transaction_hash, 1).unwrap();

    // Drain the sender's balance out from under the pending settlement to
    // simulate a competing transfer settling first.
    let mut drained = store.get_account("acc-a").unwrap().unwrap();
    drained.balance = 0;
    store.put_account(&drained).unwrap();

    let result = engine.settle(&tx.transaction_hash, 1010).unwrap();
    assert_eq!(result.status, TransactionStatus::Failed);
}
