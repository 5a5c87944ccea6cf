//! Per-account exclusive locks for settlement ordering.
//!
//! Modeled as a registry of per-`account_id` `Mutex`es rather than a single
//! global lock, so unrelated transfers never contend. Settlement always
//! acquires locks in ascending `account_id` order (spec.md §5 deadlock
//! avoidance) — callers go through [`LockTable::with_pair`] rather than
//! locking two accounts by hand.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct LockTable {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, account_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("lock table poisoned");
        locks
            .entry(account_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run `f` while holding the single account's lock.
    pub fn with_account<T>(&self, account_id: &str, f: impl FnOnce() -> T) -> T {
        let arc = self.lock_for(account_id);
        let _guard = arc.lock().expect("account lock poisoned");
        f()
    }

    /// Run `f` while holding both accounts' locks, always acquired in
    /// ascending `account_id` order so two transfers touching the same pair
    /// from opposite directions can never deadlock.
    pub fn with_pair<T>(&self, account_a: &str, account_b: &str, f: impl FnOnce() -> T) -> T {
        if account_a == account_b {
            return self.with_account(account_a, f);
        }
        let (first, second) = if account_a < account_b {
            (account_a, account_b)
        } else {
            (account_b, account_a)
        };
        let first_arc = self.lock_for(first);
        let second_arc = self.lock_for(second);
        let _first_guard = first_arc.lock().expect("account lock poisoned");
        let _second_guard = second_arc.lock().expect("account lock poisoned");
        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;

    #[test]
    fn pair_lock_serializes_opposite_order_acquisition() {
        let table = Arc::new(LockTable::new());
        let counter = Arc::new(AtomicU32::new(0));
        let t1 = Arc::clone(&table);
        let c1 = Arc::clone(&counter);
        let t2 = Arc::clone(&table);
        let c2 = Arc::clone(&counter);
        let h1 = thread::spawn(move || {
            for _ in 0..200 {
                t1.with_pair("acc-a", "acc-b", || {
                    c1.fetch_add(1, Ordering::SeqCst);
                });
            }
        });
        let h2 = thread::spawn(move || {
            for _ in 0..200 {
                t2.with_pair("acc-b", "acc-a", || {
                    c2.fetch_add(1, Ordering::SeqCst);
                });
            }
        });
        h1.join().unwrap();
        h2.join().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 400);
    }

    #[test]
    fn same_account_id_does_not_deadlock() {
        let table = LockTable::new();
        table.with_pair("acc-a", "acc-a", || {});
    }
}
