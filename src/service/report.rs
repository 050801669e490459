//! Final report assembly: recompute the summary from the page results, seal
//! the job in a terminal state and hand the snapshot to persistence.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::models::{AggregatedSummary, AuditJob, Issue, PageAuditResult};
use crate::error::{AppError, Result};
use crate::repository::AuditRepository;
use crate::service::scoring::{self, ScoringPolicy};

#[derive(Clone)]
pub struct ReportBuilder {
    repository: Arc<dyn AuditRepository>,
    policy: ScoringPolicy,
}

impl ReportBuilder {
    pub fn new(repository: Arc<dyn AuditRepository>, policy: ScoringPolicy) -> Self {
        Self { repository, policy }
    }

    pub fn repository(&self) -> &Arc<dyn AuditRepository> {
        &self.repository
    }

    pub fn summarize(&self, job: &AuditJob) -> AggregatedSummary {
        scoring::summarize(&job.pages, self.policy)
    }

    /// Seals a Running job: `None` completes it, `Some(reason)` fails it.
    /// The summary always covers whatever pages were produced.
    pub fn finish(&self, job: &mut AuditJob, failure: Option<String>) -> Result<()> {
        job.pages.sort_by_key(|page| page.position);
        let summary = self.summarize(job);
        match failure {
            None => job.complete(summary),
            Some(reason) => job.fail(reason, summary),
        }
    }

    pub async fn persist(&self, job: &AuditJob) -> Result<()> {
        self.repository
            .save(job)
            .await
            .map_err(|e| AppError::persistence(format!("saving job {}: {e:#}", job.id)))
    }
}

/// One issue with the page it was found on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocatedIssue<'a> {
    pub url: &'a str,
    #[serde(flatten)]
    pub issue: &'a Issue,
}

/// Read-only presentation view of an audit.
#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    #[serde(flatten)]
    pub job: AuditJob,
}

impl AuditReport {
    pub fn new(job: AuditJob) -> Self {
        Self { job }
    }

    pub fn summary(&self) -> &AggregatedSummary {
        &self.job.summary
    }

    pub fn page(&self, url: &str) -> Option<&PageAuditResult> {
        self.job.pages.iter().find(|page| page.url == url)
    }

    /// Every issue across the site, most severe first. Ties keep page order
    /// and then per-page order.
    pub fn sorted_issues(&self) -> Vec<LocatedIssue<'_>> {
        let mut issues: Vec<LocatedIssue<'_>> = self
            .job
            .pages
            .iter()
            .flat_map(|page| {
                page.issues.iter().map(move |issue| LocatedIssue {
                    url: &page.url,
                    issue,
                })
            })
            .collect();
        issues.sort_by_key(|located| located.issue.priority);
        issues
    }
}

impl From<AuditJob> for AuditReport {
    fn from(job: AuditJob) -> Self {
        Self::new(job)
    }
}
