use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Per-job locks serializing seal-and-persist against delete.
#[derive(Clone, Default)]
pub struct JobLocks {
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl JobLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, job_id: &Uuid) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(*job_id).or_default().clone();
        lock.lock_owned().await
    }

    /// Drops the entry once the job no longer needs serializing. Holders
    /// and waiters keep their own handle.
    pub fn forget(&self, job_id: &Uuid) {
        self.locks.remove(job_id);
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn second_holder_waits_for_first() {
        let locks = JobLocks::new();
        let id = Uuid::new_v4();
        let guard = locks.lock(&id).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(&id).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter acquires after release")
            .unwrap();
    }

    #[tokio::test]
    async fn forget_drops_entry() {
        let locks = JobLocks::new();
        let id = Uuid::new_v4();
        {
            let _guard = locks.lock(&id).await;
            locks.forget(&id);
        }
        assert!(locks.is_empty());
    }
}
