//! Request/response surface over the job processor.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::domain::models::{AuditJob, JobStatus};
use crate::error::{CommandError, AppError};
use crate::service::{AuditReport, JobProcessor};

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitAuditRequest {
    #[serde(alias = "clientId")]
    pub client_id: String,
    #[serde(alias = "targetUrl")]
    pub target_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitAuditResponse {
    pub job_id: String,
    pub status: JobStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub client_id: String,
    pub target_url: String,
    pub status: JobStatus,
    pub progress: u8,
    pub progress_is_estimate: bool,
    pub pages_processed: usize,
    pub total_pages: Option<usize>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&AuditJob> for JobStatusResponse {
    fn from(job: &AuditJob) -> Self {
        Self {
            job_id: job.id.to_string(),
            client_id: job.client_id.clone(),
            target_url: job.target_url.clone(),
            status: job.status,
            progress: job.progress.percent,
            progress_is_estimate: job.progress.is_estimate,
            pages_processed: job.progress.processed,
            total_pages: job.progress.total,
            error: job.error.clone(),
            created_at: job.created_at,
            completed_at: job.completed_at,
        }
    }
}

fn validate_submission(request: &SubmitAuditRequest) -> Result<Url, AppError> {
    let client_id = request.client_id.trim();
    if client_id.is_empty() {
        return Err(AppError::invalid_submission("client_id is required"));
    }

    let raw = request.target_url.trim();
    if raw.is_empty() {
        return Err(AppError::invalid_submission("target_url is required"));
    }

    let url = Url::from_str(raw).map_err(|e| AppError::InvalidUrl(format!("{raw}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::InvalidUrl(format!(
            "{raw}: scheme must be http or https"
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(AppError::InvalidUrl(format!("{raw}: missing host")));
    }
    Ok(url)
}

fn parse_job_id(job_id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(job_id.trim())
        .map_err(|_| AppError::invalid_submission(format!("'{job_id}' is not a valid job id")))
}

/// Synchronous API: every call returns as soon as the request is handled.
#[derive(Clone)]
pub struct AuditService {
    processor: Arc<JobProcessor>,
}

impl AuditService {
    pub fn new(processor: Arc<JobProcessor>) -> Self {
        Self { processor }
    }

    /// Validates and queues an audit. Invalid requests create nothing.
    pub async fn submit(&self, request: SubmitAuditRequest) -> Result<SubmitAuditResponse, CommandError> {
        let target = validate_submission(&request).inspect_err(|e| {
            tracing::warn!("[JOB] Rejected submission: {}", e);
        })?;

        let job_id = self
            .processor
            .submit(request.client_id.trim(), &target)
            .await;

        Ok(SubmitAuditResponse {
            job_id: job_id.to_string(),
            status: JobStatus::Queued,
        })
    }

    pub async fn status(&self, job_id: &str) -> Result<JobStatusResponse, CommandError> {
        let id = parse_job_id(job_id)?;
        let job = self.processor.find(&id).await?;
        Ok(JobStatusResponse::from(&job))
    }

    /// Full record; partial while the job is still running.
    pub async fn report(&self, job_id: &str) -> Result<AuditReport, CommandError> {
        let id = parse_job_id(job_id)?;
        Ok(AuditReport::new(self.processor.find(&id).await?))
    }

    pub async fn cancel(&self, job_id: &str) -> Result<(), CommandError> {
        let id = parse_job_id(job_id)?;
        self.processor.cancel(&id).await?;
        Ok(())
    }

    pub async fn delete(&self, job_id: &str) -> Result<(), CommandError> {
        let id = parse_job_id(job_id)?;
        self.processor.delete(&id).await?;
        Ok(())
    }

    /// Live and stored jobs, oldest first.
    pub async fn list(&self) -> Vec<JobStatusResponse> {
        self.processor
            .list()
            .await
            .iter()
            .map(JobStatusResponse::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn request(client_id: &str, target_url: &str) -> SubmitAuditRequest {
        SubmitAuditRequest {
            client_id: client_id.into(),
            target_url: target_url.into(),
        }
    }

    #[test]
    fn accepts_http_and_https() {
        assert_ok!(validate_submission(&request("acme", "https://example.com")));
        assert_ok!(validate_submission(&request("acme", " http://example.com/shop ")));
    }

    #[test]
    fn rejects_malformed_submissions() {
        let cases = [
            request("", "https://example.com"),
            request("   ", "https://example.com"),
            request("acme", ""),
            request("acme", "not a url"),
            request("acme", "ftp://example.com"),
            request("acme", "mailto:seo@example.com"),
        ];
        for case in cases {
            assert_err!(validate_submission(&case), "accepted {case:?}");
        }
    }

    #[test]
    fn request_accepts_camel_case() {
        let req: SubmitAuditRequest =
            serde_json::from_str(r#"{"clientId": "acme", "targetUrl": "https://example.com"}"#).unwrap();
        assert_eq!(req.client_id, "acme");
    }

    #[test]
    fn job_ids_must_be_uuids() {
        assert_err!(parse_job_id("42"));
        assert_ok!(parse_job_id(&Uuid::new_v4().to_string()));
    }
}
