use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::domain::models::AuditJob;
use crate::error::{AppError, Result};

/// Live job records. Every mutation runs under the job's entry lock.
#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<DashMap<Uuid, AuditJob>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: AuditJob) {
        self.jobs.insert(job.id, job);
    }

    /// Snapshot of the current record.
    pub fn get(&self, id: &Uuid) -> Result<AuditJob> {
        self.jobs
            .get(id)
            .map(|job| job.value().clone())
            .ok_or(AppError::JobNotFound(*id))
    }

    /// Runs `f` against the record while holding its entry lock. `f` must not
    /// block.
    pub fn update<T>(&self, id: &Uuid, f: impl FnOnce(&mut AuditJob) -> Result<T>) -> Result<T> {
        let mut job = self.jobs.get_mut(id).ok_or(AppError::JobNotFound(*id))?;
        f(job.value_mut())
    }

    pub fn remove(&self, id: &Uuid) -> Option<AuditJob> {
        self.jobs.remove(id).map(|(_, job)| job)
    }

    /// All jobs, oldest first.
    pub fn list(&self) -> Vec<AuditJob> {
        let mut jobs: Vec<AuditJob> = self.jobs.iter().map(|entry| entry.value().clone()).collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }
}
