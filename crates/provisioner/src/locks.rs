//! Per-instance lock registry.
//!
//! Every provision of a given instance name runs under that name's mutex, so
//! at most one strategy is in flight per instance. Distinct names never
//! contend. Entries are created on first use and kept for the life of the
//! registry; the set is bounded by the number of distinct instances served.

use crate::error::ProvisionError;
use dashmap::DashMap;
use dbprov_core::InstanceName;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

/// Registry of per-instance mutexes.
#[derive(Default)]
pub struct InstanceLocks {
    locks: DashMap<InstanceName, Arc<Mutex<()>>>,
}

/// Exclusive hold on one instance. Dropping the guard releases the lock.
pub struct InstanceLockGuard {
    instance: InstanceName,
    _guard: OwnedMutexGuard<()>,
}

impl InstanceLockGuard {
    pub fn instance(&self) -> &InstanceName {
        &self.instance
    }
}

impl InstanceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `instance`.
    ///
    /// Returns [`ProvisionError::Cancelled`] as soon as `cancel` fires, whether
    /// or not the lock is free; a cancelled waiter never holds the lock.
    pub async fn acquire(
        &self,
        instance: &InstanceName,
        cancel: &CancellationToken,
    ) -> Result<InstanceLockGuard, ProvisionError> {
        // The map shard guard must not be held across the wait below.
        let lock = self
            .locks
            .entry(instance.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProvisionError::Cancelled),
            guard = lock.lock_owned() => Ok(InstanceLockGuard {
                instance: instance.clone(),
                _guard: guard,
            }),
        }
    }

    /// Number of instance names seen so far.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
