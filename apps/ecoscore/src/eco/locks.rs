use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// One async mutex per user, so recomputations for the same user run one at a time
/// within this process. Cross-process writers are caught by the store's version check.
///
/// Entries live only while someone holds or waits on them.
#[derive(Clone, Default)]
pub struct UserLocks {
    inner: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

/// Held for the duration of one recomputation.
pub struct UserLockGuard {
    locks: UserLocks,
    user_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, user_id: Uuid) -> UserLockGuard {
        let mutex = self.inner.entry(user_id).or_default().clone();
        let guard = mutex.lock_owned().await;
        UserLockGuard {
            locks: self.clone(),
            user_id,
            guard: Some(guard),
        }
    }

    /// Drops the user's entry unless another task still holds a handle to it.
    fn release(&self, user_id: Uuid) {
        self.inner
            .remove_if(&user_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl Drop for UserLockGuard {
    fn drop(&mut self) {
        self.guard.take();
        self.locks.release(self.user_id);
    }
}
