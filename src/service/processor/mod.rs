//! Audit job orchestration: queue, worker pool and per-job page fan-out.

pub mod analyzer;
pub mod canceler;
pub mod locks;
pub mod queue;
pub mod reporter;
pub mod sources;
pub mod store;

pub use analyzer::PageAnalyzer;
pub use canceler::JobCanceler;
pub use locks::JobLocks;
pub use queue::JobQueue;
pub use reporter::{BroadcastSink, EventSink, JobEvent, ProgressReporter, TracingSink};
pub use sources::{Discovery, NarrativeAnalyzer, PageSource, RecordedCrawl, ReplaySource};
pub use store::JobStore;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::domain::models::{AuditJob, JobStatus, PageAuditResult};
use crate::error::{AppError, Result};
use crate::repository::AuditRepository;
use crate::service::report::ReportBuilder;

const CANCELLED_BEFORE_START: &str = "Cancelled before start";
const ENGINE_SHUT_DOWN: &str = "Engine shut down";

/// Owns the job lifecycle from submission to the terminal report.
pub struct JobProcessor {
    config: EngineConfig,

    // Components
    store: JobStore,
    job_queue: JobQueue,
    canceler: JobCanceler,
    job_locks: JobLocks,
    analyzer: PageAnalyzer,
    source: Arc<dyn PageSource>,
    progress_reporter: ProgressReporter,
    report_builder: ReportBuilder,

    // Worker pool
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl JobProcessor {
    pub fn new(
        config: EngineConfig,
        source: Arc<dyn PageSource>,
        narrative: Option<Arc<dyn NarrativeAnalyzer>>,
        repository: Arc<dyn AuditRepository>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let store = JobStore::new();
        let narrative = narrative.filter(|_| config.narrative_analysis);

        Self {
            job_queue: JobQueue::new(store.clone(), config.poll_interval()),
            store,
            canceler: JobCanceler::new(),
            job_locks: JobLocks::new(),
            analyzer: PageAnalyzer::new(
                source.clone(),
                narrative,
                config.scoring_policy,
                config.page_timeout(),
            ),
            source,
            progress_reporter: ProgressReporter::new(sink),
            report_builder: ReportBuilder::new(repository, config.scoring_policy),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            config,
        }
    }

    /// Spawns the worker pool.
    pub fn start(self: &Arc<Self>) {
        for worker in 0..self.config.workers {
            let processor = Arc::clone(self);
            self.tracker.spawn(async move { processor.run(worker).await });
        }
        info!(
            "[QUEUE] Started {} workers ({} pages in flight per job)",
            self.config.workers, self.config.max_concurrent_pages
        );
    }

    /// Stops claiming new jobs, fails queued ones, cancels running ones and
    /// waits for every worker to exit.
    pub async fn shutdown(&self) {
        info!("[QUEUE] Shutting down job processor...");
        self.shutdown.cancel();
        for job in self.store.list() {
            match job.status {
                JobStatus::Queued => match self.fail_queued(&job.id, ENGINE_SHUT_DOWN).await {
                    Ok(true) => info!("[JOB] Failed queued job {} on shutdown", job.id),
                    Ok(false) => {}
                    Err(e) => warn!("[JOB] Could not fail queued job {}: {}", job.id, e),
                },
                JobStatus::Running => self.canceler.set_cancelled(&job.id),
                _ => {}
            }
        }
        self.tracker.close();
        self.tracker.wait().await;
        info!("[QUEUE] Job processor stopped");
    }

    async fn run(&self, worker: usize) {
        debug!("[QUEUE] Worker {} polling", worker);

        loop {
            let claimed = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                claimed = self.job_queue.claim_next() => claimed,
            };

            if let Some(job_id) = claimed {
                self.process_job(job_id).await;
            }
        }

        debug!("[QUEUE] Worker {} stopped", worker);
    }

    // ====== API operations ======

    /// Creates a Queued job for an already validated target.
    pub async fn submit(&self, client_id: &str, target: &Url) -> Uuid {
        let job = AuditJob::new(client_id, target.as_str());
        let job_id = job.id;
        self.store.insert(job);
        self.job_queue.enqueue(job_id).await;
        info!("[JOB] Queued {} for client {} ({})", job_id, client_id, target);
        job_id
    }

    /// Live record, or the persisted one for jobs this process no longer holds.
    pub async fn find(&self, job_id: &Uuid) -> Result<AuditJob> {
        match self.store.get(job_id) {
            Ok(job) => Ok(job),
            Err(AppError::JobNotFound(_)) => self
                .report_builder
                .repository()
                .load(job_id)
                .await
                .map_err(|e| AppError::persistence(format!("{e:#}")))?
                .ok_or(AppError::JobNotFound(*job_id)),
            Err(e) => Err(e),
        }
    }

    /// Live jobs plus finished ones held only in storage, oldest first.
    pub async fn list(&self) -> Vec<AuditJob> {
        let mut jobs = self.store.list();
        let live: HashSet<Uuid> = jobs.iter().map(|job| job.id).collect();
        let repository = self.report_builder.repository();

        match repository.list_ids().await {
            Ok(ids) => {
                for id in ids.into_iter().filter(|id| !live.contains(id)) {
                    match repository.load(&id).await {
                        Ok(Some(job)) => jobs.push(job),
                        Ok(None) => {}
                        Err(e) => warn!("[JOB] Skipping stored job {}: {:#}", id, e),
                    }
                }
            }
            Err(e) => warn!("[JOB] Listing stored jobs failed: {:#}", e),
        }

        jobs.sort_by_key(|job| job.created_at);
        jobs
    }

    /// Cancels a job. Queued jobs fail immediately; Running jobs stop
    /// scheduling pages and fail once in-flight pages finish.
    pub async fn cancel(&self, job_id: &Uuid) -> Result<()> {
        if self.fail_queued(job_id, CANCELLED_BEFORE_START).await? {
            info!("[JOB] Cancelled {} before start", job_id);
            return Ok(());
        }

        // flag raised under the entry lock so it cannot outlive finalize
        let running = self.store.update(job_id, |job| match job.status {
            JobStatus::Running => {
                self.canceler.set_cancelled(job_id);
                Ok(())
            }
            status => Err(AppError::InvalidTransition {
                from: status,
                to: JobStatus::Failed,
            }),
        });

        match running {
            Ok(()) => {
                info!("[JOB] Cancelling running job {}", job_id);
                Ok(())
            }
            // finished and served from storage
            Err(AppError::JobNotFound(_)) => Err(AppError::InvalidTransition {
                from: self.find(job_id).await?.status,
                to: JobStatus::Failed,
            }),
            Err(e) => Err(e),
        }
    }

    /// Seals a Queued job as Failed without running it. Returns `false` when
    /// the job is not Queued or no longer live.
    async fn fail_queued(&self, job_id: &Uuid, reason: &str) -> Result<bool> {
        if !matches!(self.store.get(job_id), Ok(job) if job.status == JobStatus::Queued) {
            return Ok(false);
        }

        let _guard = self.job_locks.lock(job_id).await;
        let sealed = self.store.update(job_id, |job| {
            if job.status != JobStatus::Queued {
                return Ok(None);
            }
            job.transition(JobStatus::Running)?;
            self.report_builder.finish(job, Some(reason.to_string()))?;
            Ok(Some(job.clone()))
        });

        let job = match sealed {
            Ok(Some(job)) => job,
            Ok(None) => return Ok(false),
            Err(AppError::JobNotFound(_)) => {
                self.job_locks.forget(job_id);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        self.job_queue.remove(job_id).await;
        self.persist_and_notify(&job).await;
        Ok(true)
    }

    /// Removes the job and its stored report. A running job is cancelled
    /// first; its worker notices the record is gone and stops.
    pub async fn delete(&self, job_id: &Uuid) -> Result<()> {
        let _guard = self.job_locks.lock(job_id).await;
        let live = self.store.remove(job_id);
        if let Some(job) = &live {
            match job.status {
                JobStatus::Queued => {
                    self.job_queue.remove(job_id).await;
                }
                JobStatus::Running => self.canceler.set_cancelled(job_id),
                _ => {}
            }
        }

        let stored = self
            .report_builder
            .repository()
            .delete(job_id)
            .await
            .map_err(|e| AppError::persistence(format!("{e:#}")));
        self.job_locks.forget(job_id);
        let stored = stored?;

        if live.is_none() && !stored {
            return Err(AppError::JobNotFound(*job_id));
        }
        info!("[JOB] Deleted {}", job_id);
        Ok(())
    }

    // ====== Job processing ======

    /// Runs one claimed job to a terminal state.
    pub(crate) async fn process_job(&self, job_id: Uuid) {
        let timer = JobTimer::start();
        let cancel_flag = self.canceler.get_cancel_flag(&job_id);
        let job_timeout = self.config.job_timeout();

        info!("[JOB] Processing {}", job_id);

        let failure = match tokio::time::timeout(job_timeout, self.crawl_and_analyze(job_id, &cancel_flag)).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(AppError::Timeout(job_timeout).to_string()),
        };

        self.finalize(job_id, failure, &timer).await;
        self.canceler.clear(&job_id);
    }

    async fn crawl_and_analyze(&self, job_id: Uuid, cancel_flag: &Arc<AtomicBool>) -> Result<()> {
        let target_url = self.store.get(&job_id)?.target_url;
        let target =
            Url::parse(&target_url).map_err(|e| AppError::InvalidUrl(format!("{target_url}: {e}")))?;

        if cancel_flag.load(Ordering::Relaxed) {
            return Err(AppError::Cancelled);
        }

        let site = self.source.site_facts(&target).await;
        let discovery = self
            .source
            .discover(&target)
            .await
            .map_err(|e| AppError::JobFailed(format!("discovery failed: {e:#}")))?;

        let (pages, plan) = self.plan_pages(discovery, &target);
        info!("[JOB] {} auditing {} ({:?})", job_id, target, plan);

        let discovered = AtomicUsize::new(0);
        let flag = cancel_flag.clone();
        let analyzer = &self.analyzer;
        let mut results = pages
            .take_while(move |_| futures::future::ready(!flag.load(Ordering::Relaxed)))
            .enumerate()
            .map(|(position, url)| {
                discovered.fetch_max(position + 1, Ordering::Relaxed);
                analyzer.audit_page(position, url, site)
            })
            .buffer_unordered(self.config.max_concurrent_pages);

        let mut processed = 0;
        let mut degraded = 0;
        while let Some(page) = results.next().await {
            processed += 1;
            degraded += usize::from(page.outcome.is_degraded());
            let (total, is_estimate) = plan.total(discovered.load(Ordering::Relaxed));
            self.record(job_id, page, processed, total, is_estimate)?;
        }

        if cancel_flag.load(Ordering::Relaxed) {
            warn!("[JOB] {} cancelled after {} pages", job_id, processed);
            return Err(AppError::Cancelled);
        }

        if processed == 0 {
            info!("[JOB] {} discovery yielded no pages, auditing target only", job_id);
            let page = self.analyzer.audit_page(0, target, site).await;
            processed = 1;
            degraded = usize::from(page.outcome.is_degraded());
            self.record(job_id, page, processed, Some(1), false)?;
        }

        if degraded == processed {
            return Err(AppError::JobFailed(format!("all {processed} pages failed")));
        }
        if degraded > 0 {
            warn!("[JOB] {} finished with {}/{} degraded pages", job_id, degraded, processed);
        }
        Ok(())
    }

    fn plan_pages(&self, discovery: Discovery, target: &Url) -> (BoxStream<'static, Url>, PagePlan) {
        let max_pages = self.config.max_pages;

        match discovery {
            Discovery::Complete(mut urls) => {
                if urls.is_empty() {
                    info!("[JOB] No pages discovered, falling back to {}", target);
                    urls.push(target.clone());
                }
                urls.truncate(max_pages);
                let total = urls.len();
                (stream::iter(urls).boxed(), PagePlan::Exact(total))
            }
            Discovery::Streaming {
                pages,
                estimated_total,
            } => {
                let stream = stream::unfold(pages, |mut rx| async move {
                    rx.recv().await.map(|url| (url, rx))
                });
                (
                    stream.take(max_pages).boxed(),
                    PagePlan::Estimated(estimated_total.map(|t| t.min(max_pages))),
                )
            }
        }
    }

    fn record(
        &self,
        job_id: Uuid,
        page: PageAuditResult,
        processed: usize,
        total: Option<usize>,
        is_estimate: bool,
    ) -> Result<()> {
        let progress = self.store.update(&job_id, |job| {
            job.record_page(page);
            job.advance_progress(processed, total, is_estimate);
            Ok(job.progress)
        })?;
        self.progress_reporter.emit_progress(job_id, progress);
        Ok(())
    }

    async fn finalize(&self, job_id: Uuid, failure: Option<String>, timer: &JobTimer) {
        let _guard = self.job_locks.lock(&job_id).await;
        let sealed = self.store.update(&job_id, |job| {
            self.report_builder.finish(job, failure)?;
            Ok(job.clone())
        });

        match sealed {
            Ok(job) => {
                match &job.error {
                    Some(reason) => error!(
                        "[JOB] {} failed after {}ms: {}",
                        job_id,
                        timer.elapsed_ms(),
                        reason
                    ),
                    None => info!(
                        "[JOB] {} completed in {}ms ({} pages, {} issues)",
                        job_id,
                        timer.elapsed_ms(),
                        job.pages.len(),
                        job.summary.total_issues()
                    ),
                }
                self.persist_and_notify(&job).await;
            }
            // deleted while running
            Err(e) => {
                debug!("[JOB] Not finalizing {}: {}", job_id, e);
                self.job_locks.forget(&job_id);
            }
        }
    }

    /// Saves a sealed job and evicts it from the live store. Callers hold the
    /// job's lock. A job whose save failed stays live.
    async fn persist_and_notify(&self, job: &AuditJob) {
        match self.report_builder.persist(job).await {
            Ok(()) => {
                self.store.remove(&job.id);
                self.job_locks.forget(&job.id);
            }
            Err(e) => error!("[JOB] {}", e),
        }
        self.progress_reporter.emit_finished(job);
    }
}

/// How the page total is known.
#[derive(Debug, Clone, Copy)]
enum PagePlan {
    Exact(usize),
    Estimated(Option<usize>),
}

impl PagePlan {
    fn total(&self, discovered: usize) -> (Option<usize>, bool) {
        match self {
            PagePlan::Exact(total) => (Some(*total), false),
            PagePlan::Estimated(estimate) => (Some(estimate.unwrap_or(0).max(discovered)), true),
        }
    }
}

/// Job timer for measuring total audit time.
struct JobTimer {
    start: std::time::Instant,
}

impl JobTimer {
    fn start() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }

    fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }
}
