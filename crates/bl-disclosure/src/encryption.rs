//! Per-transaction and per-block encryption at rest (spec.md §4.4, §4.7).
//!
//! Two independent ciphertexts protect every transaction: a fresh
//! `transaction_key` wraps the transaction payload, and the global master
//! key wraps `transaction_key`. Compromising one transaction's key never
//! exposes another's.

use bl_core::entities::Transaction;
use bl_core::error::BlError;
use bl_core::types::{Amount, Idx, SequenceNumber, Timestamp};
use bl_crypto::keymgr::{KeyManager, COMPANY_KEY, RBI_MASTER_KEY};
use serde::{Deserialize, Serialize};

/// Decrypted view of a transaction's private payload — the minimum data
/// needed to answer a lawful disclosure request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionPayload {
    pub sender_idx: String,
    pub receiver_idx: String,
    pub sender_session_id: String,
    pub receiver_session_id: Option<String>,
    pub sender_account_id: String,
    pub receiver_account_id: Option<String>,
    pub amount: Amount,
    pub timestamp: Timestamp,
    pub sequence_number: SequenceNumber,
}

fn payload_for(tx: &Transaction) -> TransactionPayload {
    TransactionPayload {
        sender_idx: tx.sender_idx.as_str().to_string(),
        receiver_idx: tx.receiver_idx.as_str().to_string(),
        sender_session_id: tx.sender_session_id.as_str().to_string(),
        receiver_session_id: tx.receiver_session_id.as_ref().map(|s| s.as_str().to_string()),
        sender_account_id: tx.sender_account_id.clone(),
        receiver_account_id: tx.receiver_account_id.clone(),
        amount: tx.amount,
        timestamp: tx.created_at,
        sequence_number: tx.sequence_number,
    }
}

/// Reconstruct the global master key from its two halves. RBI's half is
/// permanent; the Company's half is issued per court order and rotates at
/// most every 24h (§4.5) — both live in the same key manager.
pub fn reconstruct_master_key(keymgr: &KeyManager, now: Timestamp) -> Result<[u8; 32], BlError> {
    let rbi_half = keymgr.get(RBI_MASTER_KEY)?;
    let company_half = keymgr.get_or_create(COMPANY_KEY, 32, now);
    Ok(KeyManager::combine(&rbi_half, &company_half))
}

/// Encrypt `tx`'s payload in place: generates a fresh `transaction_key`,
/// encrypts the payload with it, then wraps `transaction_key` with the
/// master key. Sets `tx.encrypted_data`/`tx.encrypted_key`.
pub fn encrypt_transaction(tx: &mut Transaction, master_key: &[u8; 32]) -> Result<(), BlError> {
    let payload = payload_for(tx);
    let payload_bytes = serde_json::to_vec(&payload).map_err(|e| BlError::Serialization(e.to_string()))?;

    let mut transaction_key = [0u8; 32];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut transaction_key);

    let data_blob = bl_crypto::encrypt(&transaction_key, &payload_bytes);
    let key_blob = bl_crypto::encrypt(master_key, &transaction_key);

    tx.encrypted_data = Some(hex::encode(data_blob));
    tx.encrypted_key = Some(hex::encode(key_blob));
    Ok(())
}

/// Reverse of [`encrypt_transaction`]: unwrap `transaction_key` with the
/// master key, then decrypt the payload with it.
pub fn decrypt_transaction(tx: &Transaction, master_key: &[u8; 32]) -> Result<TransactionPayload, BlError> {
    let encrypted_key = tx
        .encrypted_key
        .as_deref()
        .ok_or_else(|| BlError::Other(format!("transaction {} has no encrypted_key", tx.transaction_hash)))?;
    let encrypted_data = tx
        .encrypted_data
        .as_deref()
        .ok_or_else(|| BlError::Other(format!("transaction {} has no encrypted_data", tx.transaction_hash)))?;

    let key_blob = hex::decode(encrypted_key).map_err(|e| BlError::Other(e.to_string()))?;
    let transaction_key_bytes = bl_crypto::decrypt(master_key, &key_blob)?;
    let transaction_key: [u8; 32] = transaction_key_bytes
        .try_into()
        .map_err(|_| BlError::Other("unwrapped transaction key has unexpected length".to_string()))?;

    let data_blob = hex::decode(encrypted_data).map_err(|e| BlError::Other(e.to_string()))?;
    let payload_bytes = bl_crypto::decrypt(&transaction_key, &data_blob)?;
    serde_json::from_slice(&payload_bytes).map_err(|e| BlError::Serialization(e.to_string()))
}

/// The private-chain block payload (spec.md §4.7): the session→identity
/// map, the bank-account→identity map, and per-transaction metadata for
/// every transaction settled in one batch.
#[derive(Debug, Serialize, Deserialize)]
pub struct BlockPayload {
    pub session_to_idx: std::collections::BTreeMap<String, String>,
    pub bank_to_idx: std::collections::BTreeMap<String, String>,
    pub transaction_metadata: Vec<TransactionMetadata>,
    pub timestamp: Timestamp,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionMetadata {
    pub tx_hash: String,
    pub sender_idx: String,
    pub receiver_idx: String,
    pub amount: Amount,
    pub timestamp: Timestamp,
}

pub fn build_block_payload(transactions: &[Transaction], now: Timestamp) -> BlockPayload {
    let mut session_to_idx = std::collections::BTreeMap::new();
    let mut bank_to_idx = std::collections::BTreeMap::new();
    let mut transaction_metadata = Vec::with_capacity(transactions.len());

    for tx in transactions {
        session_to_idx.insert(tx.sender_session_id.as_str().to_string(), tx.sender_idx.as_str().to_string());
        if let Some(receiver_session) = &tx.receiver_session_id {
            session_to_idx.insert(receiver_session.as_str().to_string(), tx.receiver_idx.as_str().to_string());
        }
        transaction_metadata.push(TransactionMetadata {
            tx_hash: tx.transaction_hash.clone(),
            sender_idx: tx.sender_idx.as_str().to_string(),
            receiver_idx: tx.receiver_idx.as_str().to_string(),
            amount: tx.amount,
            timestamp: tx.created_at,
        });
    }

    BlockPayload {
        session_to_idx,
        bank_to_idx,
        transaction_metadata,
        timestamp: now,
    }
}

/// Populate `bank_to_idx` for a batch of accounts — kept separate from
/// [`build_block_payload`] because the validator only has account rows for
/// the transactions' endpoints, fetched from `bl-ledger` one at a time.
pub fn index_account(payload: &mut BlockPayload, bank_code: &str, account_number: &str, idx: &Idx) {
    payload
        .bank_to_idx
        .insert(format!("{bank_code}:{account_number}"), idx.as_str().to_string());
}

pub fn encrypt_block_payload(payload: &BlockPayload, master_key: &[u8; 32]) -> Result<String, BlError> {
    let bytes = serde_json::to_vec(payload).map_err(|e| BlError::Serialization(e.to_string()))?;
    Ok(hex::encode(bl_crypto::encrypt(master_key, &bytes)))
}

pub fn decrypt_block_payload(encrypted_data: &str, master_key: &[u8; 32]) -> Result<BlockPayload, BlError> {
    let blob = hex::decode(encrypted_data).map_err(|e| BlError::Other(e.to_string()))?;
    let bytes = bl_crypto::decrypt(master_key, &blob)?;
    serde_json::from_slice(&bytes).map_err(|e| BlError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bl_core::entities::AccountType;
    use bl_core::types::{SessionId, TransactionStatus, TransactionType};

    fn sample_tx() -> Transaction {
        Transaction {
            sequence_number: 1,
            transaction_hash: "hash1".to_string(),
            sender_account_id: "acc-a".to_string(),
            receiver_account_id: Some("acc-b".to_string()),
            sender_idx: Idx("IDX_a".to_string()),
            receiver_idx: Idx("IDX_b".to_string()),
            sender_session_id: SessionId("SESSION_a".to_string()),
            receiver_session_id: Some(SessionId("SESSION_b".to_string())),
            amount: 1000,
            fee: 15,
            miner_fee: 5,
            bank_fee: 10,
            transaction_type: TransactionType::Domestic,
            status: TransactionStatus::Completed,
            batch_id: Some("batch-1".to_string()),
            public_block_index: Some(1),
            private_block_index: Some(1),
            commitment: "commit".to_string(),
            nullifier: "null1".to_string(),
            encrypted_data: None,
            encrypted_key: None,
            anomaly_score: None,
            anomaly_flags: vec![],
            requires_investigation: false,
            created_at: 1000,
            completed_at: Some(1010),
            flagged_at: None,
        }
    }

    #[test]
    fn transaction_round_trips_through_encryption() {
        let keymgr = KeyManager::new();
        keymgr.seed(RBI_MASTER_KEY, b"rbi-half".to_vec(), 0);
        let master_key = reconstruct_master_key(&keymgr, 1000).unwrap();

        let mut tx = sample_tx();
        encrypt_transaction(&mut tx, &master_key).unwrap();
        assert!(tx.encrypted_data.is_some());
        assert!(tx.encrypted_key.is_some());

        let payload = decrypt_transaction(&tx, &master_key).unwrap();
        assert_eq!(payload.sender_idx, "IDX_a");
        assert_eq!(payload.amount, 1000);
    }

    #[test]
    fn wrong_master_key_fails_decryption() {
        let keymgr = KeyManager::new();
        keymgr.seed(RBI_MASTER_KEY, b"rbi-half".to_vec(), 0);
        let master_key = reconstruct_master_key(&keymgr, 1000).unwrap();

        let mut tx = sample_tx();
        encrypt_transaction(&mut tx, &master_key).unwrap();

        let wrong_key = [0xAB; 32];
        assert!(decrypt_transaction(&tx, &wrong_key).is_err());
    }

    #[test]
    fn block_payload_round_trips() {
        let keymgr = KeyManager::new();
        keymgr.seed(RBI_MASTER_KEY, b"rbi-half".to_vec(), 0);
        let master_key = reconstruct_master_key(&keymgr, 1000).unwrap();

        let tx = sample_tx();
        let payload = build_block_payload(&[tx], 1000);
        let encrypted = encrypt_block_payload(&payload, &master_key).unwrap();
        let decrypted = decrypt_block_payload(&encrypted, &master_key).unwrap();
        assert_eq!(decrypted.transaction_metadata.len(), 1);
        assert_eq!(decrypted.session_to_idx.get("SESSION_a"), Some(&"IDX_a".to_string()));
    }
}
