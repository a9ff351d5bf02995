//! Per-call mutual exclusion
//!
//! Every handler that mutates a call holds that call's guard for the whole
//! read-modify-write, so concurrent callbacks for one call are serialized
//! while different calls proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

type CallGuard = OwnedMutexGuard<()>;

/// Registry of per-call locks. Entries are held weakly and pruned once no
/// guard or waiter references them.
#[derive(Default)]
pub struct CallLocks {
    locks: Mutex<HashMap<Uuid, Weak<AsyncMutex<()>>>>,
}

impl CallLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, call_id: Uuid) -> CallGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, weak| weak.strong_count() > 0);
            match locks.get(&call_id).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(AsyncMutex::new(()));
                    locks.insert(call_id, Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }

    /// Number of calls with a live guard or waiter
    #[cfg(test)]
    pub fn active_count(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}
