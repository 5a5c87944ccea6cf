//! Key manager: holds named keys with metadata, sourced from the
//! environment first, then an in-memory store seeded at construction
//! (standing in for a secure store / dev file in this core — `bl-node` is
//! the only caller that touches `std::env` directly, per spec §9's
//! "global state becomes a dependency injected into every component").

use std::collections::HashMap;
use std::sync::RwLock;

use bl_core::error::BlError;
use bl_core::types::Timestamp;
use rand::RngCore;
use tracing::info;
use zeroize::Zeroizing;

pub const PRIVATE_CHAIN_KEY: &str = "PRIVATE_CHAIN_KEY";
pub const RBI_MASTER_KEY: &str = "RBI_MASTER_KEY";
pub const COMPANY_KEY: &str = "COMPANY_KEY";
pub const SESSION_KEY: &str = "SESSION_KEY";
pub const GLOBAL_MASTER_KEY: &str = "GLOBAL_MASTER_KEY";

#[derive(Clone)]
struct KeyRecord {
    material: Zeroizing<Vec<u8>>,
    created_at: Timestamp,
    rotated_at: Option<Timestamp>,
}

/// Holds named keys. Rotation archives the old value under a timestamped
/// alias rather than discarding it, so ciphertext still dependent on the
/// prior key remains decryptable.
pub struct KeyManager {
    keys: RwLock<HashMap<String, KeyRecord>>,
}

impl Default for KeyManager {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyManager {
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Seed a key from raw bytes (e.g. loaded by `bl-node` from the
    /// environment or a key-store URI). Does not overwrite an existing key.
    pub fn seed(&self, name: &str, material: Vec<u8>, now: Timestamp) {
        let mut keys = self.keys.write().expect("key manager lock poisoned");
        keys.entry(name.to_string()).or_insert(KeyRecord {
            material: Zeroizing::new(material),
            created_at: now,
            rotated_at: None,
        });
    }

    /// Generate a fresh cryptographically random key of `length` bytes and
    /// store it under `name`, overwriting any existing value.
    pub fn generate(&self, name: &str, length: usize, now: Timestamp) -> Vec<u8> {
        let mut material = vec![0u8; length];
        rand::thread_rng().fill_bytes(&mut material);
        let mut keys = self.keys.write().expect("key manager lock poisoned");
        keys.insert(
            name.to_string(),
            KeyRecord {
                material: Zeroizing::new(material.clone()),
                created_at: now,
                rotated_at: None,
            },
        );
        material
    }

    pub fn get(&self, name: &str) -> Result<Vec<u8>, BlError> {
        let keys = self.keys.read().expect("key manager lock poisoned");
        keys.get(name)
            .map(|r| r.material.to_vec())
            .ok_or_else(|| BlError::KeyMissing(name.to_string()))
    }

    pub fn get_or_create(&self, name: &str, length: usize, now: Timestamp) -> Vec<u8> {
        if let Ok(existing) = self.get(name) {
            return existing;
        }
        self.generate(name, length, now)
    }

    /// Rotate `name`: archive the current value under `"{name}_ARCHIVED_{now}"`
    /// and generate a fresh replacement of the same length.
    pub fn rotate(&self, name: &str, length: usize, now: Timestamp) -> Result<Vec<u8>, BlError> {
        let archived_name = format!("{name}_ARCHIVED_{now}");
        let current = self.get(name)?;
        {
            let mut keys = self.keys.write().expect("key manager lock poisoned");
            keys.insert(
                archived_name.clone(),
                KeyRecord {
                    material: Zeroizing::new(current),
                    created_at: now,
                    rotated_at: None,
                },
            );
            if let Some(rec) = keys.get_mut(name) {
                rec.rotated_at = Some(now);
            }
        }
        info!(key = name, archived_as = %archived_name, "key rotated");
        Ok(self.generate(name, length, now))
    }

    /// `sha256(k1 || k2)` — split-key reconstruction.
    pub fn combine(k1: &[u8], k2: &[u8]) -> [u8; 32] {
        crate::cipher::combine_keys(k1, k2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_is_idempotent() {
        let km = KeyManager::new();
        let a = km.get_or_create("K", 32, 1000);
        let b = km.get_or_create("K", 32, 1000);
        assert_eq!(a, b);
    }

    #[test]
    fn rotate_archives_old_key() {
        let km = KeyManager::new();
        let original = km.get_or_create(SESSION_KEY, 32, 1000);
        let rotated = km.rotate(SESSION_KEY, 32, 2000).unwrap();
        assert_ne!(original, rotated);
        let archived = km.get("SESSION_KEY_ARCHIVED_2000").unwrap();
        assert_eq!(archived, original);
    }

    #[test]
    fn missing_key_errors() {
        let km = KeyManager::new();
        assert!(matches!(km.get("NOPE"), Err(BlError::KeyMissing(_))));
    }
}
