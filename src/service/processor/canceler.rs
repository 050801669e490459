use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Per-job cancel flags shared between the API and the owning worker.
#[derive(Clone)]
pub struct JobCanceler {
    cancel_map: Arc<DashMap<Uuid, Arc<AtomicBool>>>,
}

impl JobCanceler {
    pub fn new() -> Self {
        Self {
            cancel_map: Arc::new(DashMap::with_capacity(10)),
        }
    }

    pub fn get_cancel_flag(&self, job_id: &Uuid) -> Arc<AtomicBool> {
        self.cancel_map
            .entry(*job_id)
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone()
    }

    /// Raises the flag, creating it if the worker has not asked for it yet.
    pub fn set_cancelled(&self, job_id: &Uuid) {
        self.get_cancel_flag(job_id).store(true, Ordering::Relaxed);
    }

    pub fn clear(&self, job_id: &Uuid) {
        self.cancel_map.remove(job_id);
    }
}

impl Default for JobCanceler {
    fn default() -> Self {
        Self::new()
    }
}
