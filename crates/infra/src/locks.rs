//! Exclusive per-product locking.
//!
//! A workflow holds the keys of every product it reads, mutates and logs for
//! the whole read-modify-write. Key sets are acquired all at once: a caller
//! either gets every key it asked for or waits, so two callers can never hold
//! one key each of the other's set. Waits are bounded by the table timeout.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

use stockledger_core::ProductId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockKey {
    Product(ProductId),
    /// Normalized parts number; serializes creation of the same part.
    PartsNumber(String),
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKey::Product(id) => write!(f, "product:{id}"),
            LockKey::PartsNumber(parts_number) => write!(f, "parts:{parts_number}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("timed out after {waited:?} waiting for {keys:?}")]
    Timeout { keys: Vec<LockKey>, waited: Duration },

    #[error("lock table poisoned")]
    Poisoned,
}

#[derive(Debug)]
pub struct LockTable {
    held: Mutex<HashSet<LockKey>>,
    released: Condvar,
    timeout: Duration,
}

impl LockTable {
    pub fn new(timeout: Duration) -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
            released: Condvar::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Acquire every key in `keys`, waiting up to the table timeout.
    pub fn acquire(&self, keys: Vec<LockKey>) -> Result<LockGuard<'_>, LockError> {
        let mut keys = keys;
        keys.sort_by_key(ToString::to_string);
        keys.dedup();

        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut held = self.held.lock().map_err(|_| LockError::Poisoned)?;

        while keys.iter().any(|k| held.contains(k)) {
            let now = Instant::now();
            if now >= deadline {
                return Err(LockError::Timeout {
                    keys,
                    waited: now - started,
                });
            }
            let (guard, _) = self
                .released
                .wait_timeout(held, deadline - now)
                .map_err(|_| LockError::Poisoned)?;
            held = guard;
        }

        for key in &keys {
            held.insert(key.clone());
        }
        debug!(keys = ?keys, waited_ms = started.elapsed().as_millis() as u64, "locks acquired");

        Ok(LockGuard { table: self, keys })
    }

    pub fn is_locked(&self, key: &LockKey) -> bool {
        self.held.lock().map(|held| held.contains(key)).unwrap_or(true)
    }
}

/// Releases its keys on drop.
#[derive(Debug)]
pub struct LockGuard<'a> {
    table: &'a LockTable,
    keys: Vec<LockKey>,
}

impl LockGuard<'_> {
    pub fn keys(&self) -> &[LockKey] {
        &self.keys
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        let mut held = match self.table.held.lock() {
            Ok(held) => held,
            Err(poisoned) => poisoned.into_inner(),
        };
        for key in &self.keys {
            held.remove(key);
        }
        drop(held);
        self.table.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn guard_releases_keys_on_drop() {
        let table = LockTable::new(Duration::from_millis(50));
        let key = LockKey::Product(ProductId::new());

        let guard = table.acquire(vec![key.clone()]).unwrap();
        assert!(table.is_locked(&key));
        drop(guard);
        assert!(!table.is_locked(&key));
    }

    #[test]
    fn duplicate_keys_in_one_request_do_not_self_block() {
        let table = LockTable::new(Duration::from_millis(50));
        let key = LockKey::Product(ProductId::new());

        let guard = table.acquire(vec![key.clone(), key.clone()]).unwrap();
        assert_eq!(guard.keys().len(), 1);
    }

    #[test]
    fn held_key_times_out_other_callers() {
        let table = LockTable::new(Duration::from_millis(30));
        let key = LockKey::PartsNumber("BP-1".into());
        let _held = table.acquire(vec![key.clone()]).unwrap();

        match table.acquire(vec![LockKey::Product(ProductId::new()), key]) {
            Err(LockError::Timeout { keys, waited }) => {
                assert_eq!(keys.len(), 2);
                assert!(waited >= Duration::from_millis(30));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn disjoint_keys_do_not_wait() {
        let table = LockTable::new(Duration::from_millis(10));
        let _a = table.acquire(vec![LockKey::Product(ProductId::new())]).unwrap();
        assert!(table.acquire(vec![LockKey::Product(ProductId::new())]).is_ok());
    }

    #[test]
    fn waiters_proceed_one_at_a_time() {
        let table = Arc::new(LockTable::new(Duration::from_secs(5)));
        let key = LockKey::Product(ProductId::new());
        let inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let table = Arc::clone(&table);
                let key = key.clone();
                let inside = Arc::clone(&inside);
                thread::spawn(move || {
                    let _guard = table.acquire(vec![key]).unwrap();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    thread::sleep(Duration::from_millis(2));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert!(!table.is_locked(&key));
    }
}
