//! Mutual exclusion for record access.
//!
//! `SessionStore` takes a `RecordLock` guard around every load, save and
//! delete, so a reader never observes a partially written record.
//!
//! - `GlobalLock`: one mutex for every recipient. `GlobalLock::process()`
//!   shares a single mutex across every store in the process.
//! - `ShardedLock`: recipients hash onto a fixed set of mutexes, so records
//!   for different recipients usually do not contend.
//!
//! The mutexes guard `()`, so a poisoned lock carries no broken state and is
//! recovered rather than propagated.

use std::sync::{Arc, Mutex, MutexGuard};

use once_cell::sync::Lazy;

use crate::config::StoreConfig;
use crate::state::RecipientId;

static PROCESS_LOCK: Lazy<Arc<Mutex<()>>> = Lazy::new(|| Arc::new(Mutex::new(())));

/// Lock guarding record access for a recipient
pub trait RecordLock {
    fn acquire(&self, recipient_id: RecipientId) -> MutexGuard<'_, ()>;
}

fn acquire_mutex(mutex: &Mutex<()>) -> MutexGuard<'_, ()> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Single lock serializing access to every record
#[derive(Clone, Debug)]
pub struct GlobalLock {
    mutex: Arc<Mutex<()>>,
}

impl GlobalLock {
    /// Handle to the process-wide lock
    #[must_use]
    pub fn process() -> Self {
        Self {
            mutex: Arc::clone(&*PROCESS_LOCK),
        }
    }

    /// Lock private to this handle and its clones
    #[must_use]
    pub fn isolated() -> Self {
        Self {
            mutex: Arc::new(Mutex::new(())),
        }
    }

    /// Whether two handles serialize against each other
    #[must_use]
    pub fn shares_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.mutex, &other.mutex)
    }
}

impl Default for GlobalLock {
    fn default() -> Self {
        Self::process()
    }
}

impl RecordLock for GlobalLock {
    fn acquire(&self, _recipient_id: RecipientId) -> MutexGuard<'_, ()> {
        acquire_mutex(&self.mutex)
    }
}

/// Fixed set of locks selected by recipient id
#[derive(Debug)]
pub struct ShardedLock {
    shards: Vec<Mutex<()>>,
}

impl ShardedLock {
    /// Create with `shards` locks (at least 1)
    #[must_use]
    pub fn new(shards: usize) -> Self {
        Self {
            shards: (0..shards.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Create with the shard count from `config`
    #[must_use]
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.lock_shards())
    }

    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    #[must_use]
    pub fn shard_index(&self, recipient_id: RecipientId) -> usize {
        (recipient_id % self.shards.len() as u64) as usize
    }
}

impl RecordLock for ShardedLock {
    fn acquire(&self, recipient_id: RecipientId) -> MutexGuard<'_, ()> {
        acquire_mutex(&self.shards[self.shard_index(recipient_id)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_process_handles_share_one_mutex() {
        assert!(GlobalLock::process().shares_with(&GlobalLock::default()));
        assert!(!GlobalLock::process().shares_with(&GlobalLock::isolated()));
    }

    #[test]
    fn test_global_lock_serializes_different_recipients() {
        let lock = GlobalLock::isolated();
        let guard = lock.acquire(1);

        let other = lock.clone();
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            let _guard = other.acquire(2);
            tx.send(()).unwrap();
        });

        // Recipient 2 must wait while recipient 1 holds the lock
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(guard);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_sharded_lock_index() {
        let lock = ShardedLock::new(4);
        assert_eq!(lock.shard_count(), 4);
        assert_eq!(lock.shard_index(1), lock.shard_index(5));
        assert_ne!(lock.shard_index(1), lock.shard_index(2));
    }

    #[test]
    fn test_sharded_lock_different_shards_do_not_contend() {
        let lock = ShardedLock::new(2);
        let _first = lock.acquire(0);
        // Shard 1 is free even though shard 0 is held
        let _second = lock.acquire(1);
    }

    #[test]
    fn test_sharded_lock_from_config() {
        let lock = ShardedLock::from_config(&StoreConfig::new().with_lock_shards(3));
        assert_eq!(lock.shard_count(), 3);
    }

    #[test]
    fn test_zero_shards_clamped() {
        assert_eq!(ShardedLock::new(0).shard_count(), 1);
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let lock = Arc::new(GlobalLock::isolated());
        let poisoner = Arc::clone(&lock);
        let _ = thread::spawn(move || {
            let _guard = poisoner.acquire(1);
            panic!("poison");
        })
        .join();

        let _guard = lock.acquire(1);
    }
}
