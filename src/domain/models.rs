//! Rich domain entities - behavior lives WITH data

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::signals::PageSignals;
use crate::error::{AppError, Result};

// ====== Enums ======

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IssuePriority {
    Critical,
    High,
    Medium,
    Low,
}

impl IssuePriority {
    pub const ALL: [IssuePriority; 4] = [
        IssuePriority::Critical,
        IssuePriority::High,
        IssuePriority::Medium,
        IssuePriority::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssuePriority::Critical => "Critical",
            IssuePriority::High => "High",
            IssuePriority::Medium => "Medium",
            IssuePriority::Low => "Low",
        }
    }
}

/// Score rollup groups. Advisory categories belong to none of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Section {
    Technical,
    #[serde(rename = "On-Page")]
    OnPage,
    Performance,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Technical, Section::OnPage, Section::Performance];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Technical => "Technical",
            Section::OnPage => "On-Page",
            Section::Performance => "Performance",
        }
    }
}

/// The fixed category catalogue, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CategoryKind {
    Crawlability,
    Performance,
    Mobile,
    Links,
    Security,
    MetaTags,
    Headings,
    Content,
    Images,
    Schema,
    OffPage,
    UserExperience,
    ContentStrategy,
}

impl CategoryKind {
    pub const ALL: [CategoryKind; 13] = [
        CategoryKind::Crawlability,
        CategoryKind::Performance,
        CategoryKind::Mobile,
        CategoryKind::Links,
        CategoryKind::Security,
        CategoryKind::MetaTags,
        CategoryKind::Headings,
        CategoryKind::Content,
        CategoryKind::Images,
        CategoryKind::Schema,
        CategoryKind::OffPage,
        CategoryKind::UserExperience,
        CategoryKind::ContentStrategy,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            CategoryKind::Crawlability => "Technical • Crawlability & Indexing",
            CategoryKind::Performance => "Technical • Performance",
            CategoryKind::Mobile => "Technical • Mobile",
            CategoryKind::Links => "Technical • Links",
            CategoryKind::Security => "Technical • Security",
            CategoryKind::MetaTags => "On-Page • Meta Tags",
            CategoryKind::Headings => "On-Page • Headings",
            CategoryKind::Content => "On-Page • Content",
            CategoryKind::Images => "On-Page • Images",
            CategoryKind::Schema => "On-Page • Schema",
            CategoryKind::OffPage => "Off-Page • Authority",
            CategoryKind::UserExperience => "UX • Usability",
            CategoryKind::ContentStrategy => "Content Strategy • Depth",
        }
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Queued -> Running -> {Completed | Failed}. Nothing else.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

// ====== Checks & Categories ======

/// A single pass/fail/unknown evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub category: CategoryKind,
    pub label: String,
    pub status: CheckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Check {
    pub fn is_fail(&self) -> bool {
        self.status == CheckStatus::Fail
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckTally {
    pub pass: u32,
    pub fail: u32,
    pub unknown: u32,
}

impl CheckTally {
    pub fn record(&mut self, status: CheckStatus) {
        match status {
            CheckStatus::Pass => self.pass += 1,
            CheckStatus::Fail => self.fail += 1,
            CheckStatus::Unknown => self.unknown += 1,
        }
    }

    pub fn merge(&mut self, other: &CheckTally) {
        self.pass += other.pass;
        self.fail += other.fail;
        self.unknown += other.unknown;
    }

    pub fn total(&self) -> u32 {
        self.pass + self.fail + self.unknown
    }

    /// Checks that produced a definite answer.
    pub fn evaluated(&self) -> u32 {
        self.pass + self.fail
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub kind: CategoryKind,
    pub title: String,
    pub items: Vec<Check>,
}

impl Category {
    pub fn new(kind: CategoryKind, items: Vec<Check>) -> Self {
        Self {
            kind,
            title: kind.title().to_string(),
            items,
        }
    }

    pub fn tally(&self) -> CheckTally {
        self.items.iter().fold(CheckTally::default(), |mut acc, check| {
            acc.record(check.status);
            acc
        })
    }

    pub fn fail_count(&self) -> usize {
        self.items.iter().filter(|c| c.is_fail()).count()
    }
}

// ====== Issues ======

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub text: String,
    pub priority: IssuePriority,
}

impl Issue {
    pub fn new(text: impl Into<String>, priority: IssuePriority) -> Self {
        Self {
            text: text.into(),
            priority,
        }
    }
}

// ====== Page results ======

/// How a page's result came to be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum PageOutcome {
    Analyzed,
    FetchFailed(String),
    AnalysisFailed(String),
}

impl PageOutcome {
    pub fn is_degraded(&self) -> bool {
        !matches!(self, PageOutcome::Analyzed)
    }
}

/// Computed once per page; replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageAuditResult {
    /// Index in discovery order.
    pub position: usize,
    pub url: String,
    pub outcome: PageOutcome,
    pub signals: PageSignals,
    pub categories: Vec<Category>,
    pub issues: Vec<Issue>,
    pub per_page_score: Option<u8>,
    /// Opportunities and recommendations from the narrative analyzer.
    #[serde(default)]
    pub advice: Vec<String>,
}

// ====== Summary ======

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedSummary {
    pub priority_counts: BTreeMap<IssuePriority, usize>,
    pub category_totals: BTreeMap<String, CheckTally>,
    pub section_scores: BTreeMap<Section, Option<u8>>,
    pub overall_score: Option<u8>,
}

impl Default for AggregatedSummary {
    fn default() -> Self {
        Self {
            priority_counts: IssuePriority::ALL.iter().map(|p| (*p, 0)).collect(),
            category_totals: BTreeMap::new(),
            section_scores: Section::ALL.iter().map(|s| (*s, None)).collect(),
            overall_score: None,
        }
    }
}

impl AggregatedSummary {
    pub fn total_issues(&self) -> usize {
        self.priority_counts.values().sum()
    }

    pub fn count(&self, priority: IssuePriority) -> usize {
        self.priority_counts.get(&priority).copied().unwrap_or(0)
    }
}

// ====== Jobs ======

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub percent: u8,
    pub processed: usize,
    /// Expected page count; an estimate when `is_estimate` is set.
    pub total: Option<usize>,
    pub is_estimate: bool,
}

/// One full-site audit run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditJob {
    pub id: Uuid,
    pub client_id: String,
    pub target_url: String,
    pub status: JobStatus,
    pub progress: Progress,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub pages: Vec<PageAuditResult>,
    pub summary: AggregatedSummary,
}

impl AuditJob {
    pub fn new(client_id: impl Into<String>, target_url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id: client_id.into(),
            target_url: target_url.into(),
            status: JobStatus::Queued,
            progress: Progress::default(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
            pages: Vec::new(),
            summary: AggregatedSummary::default(),
        }
    }

    pub fn progress_percent(&self) -> u8 {
        self.progress.percent
    }

    /// Moves the job along its lifecycle, stamping timestamps.
    pub fn transition(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        match next {
            JobStatus::Running => self.started_at = Some(Utc::now()),
            JobStatus::Completed | JobStatus::Failed => self.completed_at = Some(Utc::now()),
            JobStatus::Queued => {}
        }
        self.status = next;
        Ok(())
    }

    /// Applies a progress reading. Percent never goes backwards.
    pub fn advance_progress(&mut self, processed: usize, total: Option<usize>, is_estimate: bool) {
        let percent = match total {
            Some(total) if total > 0 => {
                let exact = ((processed as f64 / total as f64) * 100.0).round() as u8;
                let exact = exact.min(100);
                if is_estimate {
                    exact.min(99)
                } else {
                    exact
                }
            }
            _ => 0,
        };

        self.progress = Progress {
            percent: percent.max(self.progress.percent),
            processed: processed.max(self.progress.processed),
            total,
            is_estimate,
        };
    }

    /// Inserts a page result, keeping discovery order. A result for the same
    /// position replaces the previous one.
    pub fn record_page(&mut self, page: PageAuditResult) {
        match self
            .pages
            .binary_search_by_key(&page.position, |p| p.position)
        {
            Ok(idx) => self.pages[idx] = page,
            Err(idx) => self.pages.insert(idx, page),
        }
    }

    pub fn complete(&mut self, summary: AggregatedSummary) -> Result<()> {
        self.transition(JobStatus::Completed)?;
        self.summary = summary;
        self.progress.percent = 100;
        self.progress.is_estimate = false;
        self.progress.total = Some(self.progress.processed);
        Ok(())
    }

    /// Fails the job; pages already produced stay.
    pub fn fail(&mut self, error: impl Into<String>, summary: AggregatedSummary) -> Result<()> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(error.into());
        self.summary = summary;
        Ok(())
    }

    pub fn total_issues(&self) -> usize {
        self.pages.iter().map(|p| p.issues.len()).sum()
    }
}
