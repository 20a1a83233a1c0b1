//! Exclusive per-product and per-document locks.
//!
//! A caller names every key it needs up front and [`ProductLockTable::acquire`]
//! takes them all at once, only when none is held. Nobody ever holds some keys
//! while waiting for others, so lock ordering cannot deadlock.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use stockmaster_core::{DomainError, DomainResult};
use stockmaster_operations::DocumentId;
use stockmaster_products::ProductId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockKey {
    Product(ProductId),
    Document(DocumentId),
}

impl core::fmt::Display for LockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LockKey::Product(id) => write!(f, "product {id}"),
            LockKey::Document(id) => write!(f, "document {id}"),
        }
    }
}

#[derive(Debug, Default)]
pub struct ProductLockTable {
    held: Mutex<HashSet<LockKey>>,
    released: Condvar,
}

impl ProductLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    // The set is only touched by insert/remove, so a poisoned guard still holds
    // a consistent set.
    fn lock_held(&self) -> MutexGuard<'_, HashSet<LockKey>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take every key, waiting at most `timeout` for all of them to be free.
    ///
    /// Fails with a retryable `Contention` error on timeout.
    pub fn acquire(&self, keys: &[LockKey], timeout: Duration) -> DomainResult<LockGuard<'_>> {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();

        let deadline = Instant::now() + timeout;
        let mut held = self.lock_held();

        while let Some(busy) = keys.iter().find(|k| held.contains(*k)) {
            let now = Instant::now();
            if now >= deadline {
                return Err(DomainError::contention(format!(
                    "timed out after {}ms waiting for {busy}",
                    timeout.as_millis()
                )));
            }
            held = self
                .released
                .wait_timeout(held, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }

        held.extend(keys.iter().copied());
        Ok(LockGuard { table: self, keys })
    }

    /// Number of keys currently held.
    pub fn held_count(&self) -> usize {
        self.lock_held().len()
    }
}

/// Releases its keys on drop.
#[derive(Debug)]
pub struct LockGuard<'a> {
    table: &'a ProductLockTable,
    keys: Vec<LockKey>,
}

impl LockGuard<'_> {
    pub fn keys(&self) -> &[LockKey] {
        &self.keys
    }

    pub fn covers(&self, key: &LockKey) -> bool {
        self.keys.contains(key)
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        let mut held = self.table.lock_held();
        for key in &self.keys {
            held.remove(key);
        }
        drop(held);
        self.table.released.notify_all();
    }
}
