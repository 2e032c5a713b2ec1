//! Process-local mutual exclusion per group id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use common::GroupId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<GroupId, Arc<AsyncMutex<()>>>;

/// Serializes join runs that touch the same groups.
///
/// Locks are taken in id order so two runs sharing groups cannot deadlock.
/// Entries nobody holds or waits on are pruned on the next acquisition.
#[derive(Debug, Clone, Default)]
pub struct HostLocks {
    locks: Arc<Mutex<LockMap>>,
}

/// Holds the locks of every group passed to [`HostLocks::acquire`].
#[derive(Debug)]
pub struct GroupLockGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl HostLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until every listed group is free, then holds them all.
    pub async fn acquire(&self, ids: &[&GroupId]) -> GroupLockGuard {
        let mut keys: Vec<GroupId> = ids.iter().map(|id| (*id).clone()).collect();
        keys.sort();
        keys.dedup();

        let mutexes: Vec<Arc<AsyncMutex<()>>> = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
            keys.into_iter()
                .map(|key| locks.entry(key).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }
        GroupLockGuard { _guards: guards }
    }

    /// Returns the number of lock entries currently tracked.
    pub fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
