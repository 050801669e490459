//! Audits a recorded crawl and prints the report as JSON.
//!
//! Usage: `seo-audit <crawl.json> [report-dir]`

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use seo_audit::commands::SubmitAuditRequest;
use seo_audit::config::EngineConfig;
use seo_audit::lifecycle::{self, Collaborators};
use seo_audit::repository::{AuditRepository, JsonFileRepository, MemoryRepository};
use seo_audit::service::processor::{RecordedCrawl, ReplaySource, TracingSink};

const STATUS_POLL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<()> {
    lifecycle::init_logging();

    let mut args = std::env::args().skip(1);
    let Some(crawl_path) = args.next().map(PathBuf::from) else {
        bail!("usage: seo-audit <crawl.json> [report-dir]");
    };
    let report_dir = args.next().map(PathBuf::from);

    let config = EngineConfig::from_env()?;
    let crawl = RecordedCrawl::load(&crawl_path)?;
    let request = SubmitAuditRequest {
        client_id: if crawl.client_id.is_empty() {
            "local".to_string()
        } else {
            crawl.client_id.clone()
        },
        target_url: crawl.target_url.clone(),
    };

    let repository: Arc<dyn AuditRepository> = match report_dir {
        Some(dir) => Arc::new(JsonFileRepository::open(dir).await?),
        None => Arc::new(MemoryRepository::new()),
    };
    let replay = Arc::new(ReplaySource::new(crawl));

    let (processor, service) = lifecycle::setup(
        config,
        Collaborators {
            source: replay.clone(),
            narrative: Some(replay),
            repository,
            sink: Arc::new(TracingSink),
        },
    );

    let submitted = service.submit(request).await?;
    let job_id = submitted.job_id;

    loop {
        let status = service.status(&job_id).await?;
        if status.status.is_terminal() {
            break;
        }
        tokio::time::sleep(STATUS_POLL).await;
    }

    let report = service.report(&job_id).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("serializing report")?
    );

    lifecycle::shutdown(&processor).await;
    Ok(())
}
