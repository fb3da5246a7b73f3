//! Per-owner async locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use billing_core::UserId;

/// Serializes lifecycle operations per owner.
///
/// Operations on different owners never contend. Entries whose lock nobody
/// holds or waits on are pruned on the next acquisition.
#[derive(Default)]
pub struct OwnerLocks {
    locks: Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>,
}

impl OwnerLocks {
    /// Wait for exclusive access to `owner`'s billing state.
    pub async fn acquire(&self, owner: &UserId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|id, lock| id == owner || Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(*owner).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of owners currently tracked.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
