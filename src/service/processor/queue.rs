use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use super::store::JobStore;
use crate::domain::models::JobStatus;

/// Idle wake-up interval when nothing signals new work.
pub const JOB_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// FIFO of Queued job ids. Claiming moves a job to Running under its entry
/// lock, so exactly one worker ever owns it.
pub struct JobQueue {
    pending: Mutex<VecDeque<Uuid>>,
    notify: Notify,
    store: JobStore,
    poll_interval: Duration,
}

impl JobQueue {
    pub fn new(store: JobStore, poll_interval: Duration) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            store,
            poll_interval,
        }
    }

    pub async fn enqueue(&self, job_id: Uuid) {
        self.pending.lock().await.push_back(job_id);
        self.notify.notify_one();
    }

    /// Drops a job that has not been claimed yet.
    pub async fn remove(&self, job_id: &Uuid) -> bool {
        let mut pending = self.pending.lock().await;
        let before = pending.len();
        pending.retain(|id| id != job_id);
        pending.len() != before
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Claims the next Queued job, waiting up to one poll interval for work.
    /// Returns `None` when the queue stayed empty.
    pub async fn claim_next(&self) -> Option<Uuid> {
        loop {
            let next = self.pending.lock().await.pop_front();

            match next {
                Some(job_id) => {
                    match self
                        .store
                        .update(&job_id, |job| job.transition(JobStatus::Running))
                    {
                        Ok(()) => {
                            tracing::debug!("[QUEUE] Claimed job {}", job_id);
                            return Some(job_id);
                        }
                        // deleted or cancelled while waiting
                        Err(e) => tracing::debug!("[QUEUE] Skipping job {}: {}", job_id, e),
                    }
                }
                None => {
                    tracing::trace!("[QUEUE] No pending jobs, waiting...");
                    let _ = tokio::time::timeout(self.poll_interval, self.notify.notified()).await;
                    if self.is_empty().await {
                        return None;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::AuditJob;

    fn queued(store: &JobStore) -> Uuid {
        let job = AuditJob::new("acme", "https://example.com");
        let id = job.id;
        store.insert(job);
        id
    }

    #[tokio::test]
    async fn claims_in_submission_order() {
        let store = JobStore::new();
        let queue = JobQueue::new(store.clone(), Duration::from_millis(10));
        let first = queued(&store);
        let second = queued(&store);
        queue.enqueue(first).await;
        queue.enqueue(second).await;

        assert_eq!(queue.claim_next().await, Some(first));
        assert_eq!(store.get(&first).unwrap().status, JobStatus::Running);
        assert_eq!(queue.claim_next().await, Some(second));
        assert_eq!(queue.claim_next().await, None);
    }

    #[tokio::test]
    async fn skips_jobs_no_longer_queued() {
        let store = JobStore::new();
        let queue = JobQueue::new(store.clone(), Duration::from_millis(10));
        let deleted = queued(&store);
        let live = queued(&store);
        queue.enqueue(deleted).await;
        queue.enqueue(live).await;
        store.remove(&deleted);

        assert_eq!(queue.claim_next().await, Some(live));
    }

    #[tokio::test]
    async fn remove_unclaimed_job() {
        let store = JobStore::new();
        let queue = JobQueue::new(store.clone(), Duration::from_millis(10));
        let id = queued(&store);
        queue.enqueue(id).await;

        assert!(queue.remove(&id).await);
        assert!(!queue.remove(&id).await);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn enqueue_wakes_idle_claimer() {
        let store = JobStore::new();
        let queue = std::sync::Arc::new(JobQueue::new(store.clone(), Duration::from_secs(30)));
        let id = queued(&store);

        let claimer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.claim_next().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.enqueue(id).await;

        let claimed = tokio::time::timeout(Duration::from_secs(5), claimer)
            .await
            .expect("claimer woke up")
            .unwrap();
        assert_eq!(claimed, Some(id));
    }
}
