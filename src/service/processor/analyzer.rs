//! Per-page pipeline: fetch -> narrative -> evaluate -> synthesize -> score.
//!
//! Every path returns a `PageAuditResult`. Fetch failures, timeouts and
//! panics during analysis become degraded results instead of errors.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, warn};
use url::Url;

use super::sources::{NarrativeAnalyzer, PageSource};
use crate::domain::models::{
    Category, CategoryKind, Check, CheckStatus, Issue, IssuePriority, PageAuditResult, PageOutcome,
};
use crate::domain::signals::{PageSignals, SiteFacts};
use crate::error::AppError;
use crate::service::issues::{self, NarrativeFindings};
use crate::service::rules;
use crate::service::scoring::{self, ScoringPolicy};

pub struct PageAnalyzer {
    source: Arc<dyn PageSource>,
    narrative: Option<Arc<dyn NarrativeAnalyzer>>,
    policy: ScoringPolicy,
    page_timeout: Duration,
}

impl PageAnalyzer {
    pub fn new(
        source: Arc<dyn PageSource>,
        narrative: Option<Arc<dyn NarrativeAnalyzer>>,
        policy: ScoringPolicy,
        page_timeout: Duration,
    ) -> Self {
        Self {
            source,
            narrative,
            policy,
            page_timeout,
        }
    }

    pub async fn audit_page(&self, position: usize, url: Url, site: SiteFacts) -> PageAuditResult {
        let started = Instant::now();
        let result = self.run(position, &url, site).await;

        debug!(
            "[PAGE] #{} {} -> {} issues in {}ms",
            position,
            url,
            result.issues.len(),
            started.elapsed().as_millis()
        );
        result
    }

    async fn run(&self, position: usize, url: &Url, site: SiteFacts) -> PageAuditResult {
        let signals = match tokio::time::timeout(self.page_timeout, self.source.fetch(url)).await {
            Ok(Ok(mut signals)) => {
                if signals.url.trim().is_empty() {
                    signals.url = url.to_string();
                }
                signals
            }
            Ok(Err(e)) => {
                let error = AppError::fetch(url.as_str(), format!("{e:#}"));
                warn!("[PAGE] {}", error);
                PageSignals::unreachable(url.as_str(), format!("{e:#}"))
            }
            Err(_) => {
                warn!("[PAGE] {} timed out after {:?}", url, self.page_timeout);
                PageSignals::unreachable(url.as_str(), AppError::Timeout(self.page_timeout).to_string())
            }
        };

        if !signals.was_fetched() {
            return analyze_signals(position, signals, &site, &NarrativeFindings::default(), self.policy);
        }

        // Spawned so a panic in analysis only takes down this page. Aborted
        // if this future is dropped.
        let narrative = self.narrative.clone();
        let narrative_timeout = self.page_timeout;
        let policy = self.policy;
        let snapshot = signals.clone();
        let handle = AbortOnDropHandle::new(tokio::spawn(async move {
            let findings = match narrative {
                Some(analyzer) => narrative_findings(analyzer.as_ref(), &signals, narrative_timeout).await,
                None => NarrativeFindings::default(),
            };
            analyze_signals(position, signals, &site, &findings, policy)
        }));

        match handle.await {
            Ok(result) => result,
            Err(join_error) => {
                let error = AppError::analysis(url.as_str(), panic_reason(join_error));
                warn!("[PAGE] {}", error);
                analysis_failed(position, snapshot, error.to_string())
            }
        }
    }
}

/// Narrative findings within `limit`. Errors and timeouts yield no findings.
async fn narrative_findings(
    analyzer: &dyn NarrativeAnalyzer,
    signals: &PageSignals,
    limit: Duration,
) -> NarrativeFindings {
    match tokio::time::timeout(limit, analyzer.analyze(signals)).await {
        Ok(Ok(findings)) => findings,
        Ok(Err(e)) => {
            warn!("[PAGE] Narrative analysis failed for {}: {:#}", signals.url, e);
            NarrativeFindings::default()
        }
        Err(_) => {
            warn!("[PAGE] Narrative analysis for {} timed out after {:?}", signals.url, limit);
            NarrativeFindings::default()
        }
    }
}

/// Pure analysis of already-fetched signals.
pub fn analyze_signals(
    position: usize,
    signals: PageSignals,
    site: &SiteFacts,
    findings: &NarrativeFindings,
    policy: ScoringPolicy,
) -> PageAuditResult {
    let evaluation = rules::evaluate(&signals, site);
    let issues = issues::synthesize(&findings.critical_issues, &signals, &evaluation.categories);
    let per_page_score = scoring::page_score(&evaluation.categories, policy);

    let outcome = if signals.was_fetched() {
        PageOutcome::Analyzed
    } else if signals.fetch_error.is_empty() {
        PageOutcome::FetchFailed(format!("HTTP status {}", signals.status_code))
    } else {
        PageOutcome::FetchFailed(signals.fetch_error.clone())
    };

    PageAuditResult {
        position,
        url: signals.url.clone(),
        outcome,
        signals,
        categories: evaluation.categories,
        issues,
        per_page_score,
        advice: findings.advice(),
    }
}

/// Result for a page whose analysis crashed: every category unknown.
pub fn analysis_failed(position: usize, signals: PageSignals, reason: String) -> PageAuditResult {
    let categories = CategoryKind::ALL
        .iter()
        .map(|kind| {
            Category::new(
                *kind,
                vec![Check {
                    category: *kind,
                    label: "Analysis completed".to_string(),
                    status: CheckStatus::Unknown,
                    note: Some(reason.clone()),
                }],
            )
        })
        .collect();

    PageAuditResult {
        position,
        url: signals.url.clone(),
        outcome: PageOutcome::AnalysisFailed(reason.clone()),
        signals,
        categories,
        issues: vec![Issue::new(reason, IssuePriority::High)],
        per_page_score: None,
        advice: Vec::new(),
    }
}

fn panic_reason(error: tokio::task::JoinError) -> String {
    if !error.is_panic() {
        return error.to_string();
    }
    let payload = error.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "analysis panicked".to_string()
    }
}
