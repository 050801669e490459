use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::models::{AuditJob, JobStatus, Progress};

/// Notifications observable by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    Progress {
        job_id: Uuid,
        progress: Progress,
    },
    Finished {
        job_id: Uuid,
        client_id: String,
        status: JobStatus,
        error: Option<String>,
    },
}

impl JobEvent {
    pub fn job_id(&self) -> Uuid {
        match self {
            JobEvent::Progress { job_id, .. } | JobEvent::Finished { job_id, .. } => *job_id,
        }
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: JobEvent);
}

/// Writes events to the log only.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: JobEvent) {
        match &event {
            JobEvent::Progress { job_id, progress } => tracing::debug!(
                "[JOB] {} progress {}% ({} pages)",
                job_id,
                progress.percent,
                progress.processed
            ),
            JobEvent::Finished {
                job_id,
                client_id,
                status,
                ..
            } => tracing::info!("[JOB] {} for {} finished: {}", job_id, client_id, status.as_str()),
        }
    }
}

/// Fans events out to any number of subscribers. Lagging subscribers lose
/// the oldest events.
pub struct BroadcastSink {
    sender: broadcast::Sender<JobEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: JobEvent) {
        // no subscribers is fine
        let _ = self.sender.send(event);
    }
}

#[derive(Clone)]
pub struct ProgressReporter {
    sink: Arc<dyn EventSink>,
}

impl ProgressReporter {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    pub fn emit_progress(&self, job_id: Uuid, progress: Progress) {
        self.sink.emit(JobEvent::Progress { job_id, progress });
    }

    /// Call exactly once, after the terminal transition.
    pub fn emit_finished(&self, job: &AuditJob) {
        self.sink.emit(JobEvent::Finished {
            job_id: job.id,
            client_id: job.client_id.clone(),
            status: job.status,
            error: job.error.clone(),
        });
    }
}
