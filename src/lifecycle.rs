//! Engine lifecycle: logging, wiring and shutdown.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::commands::AuditService;
use crate::config::EngineConfig;
use crate::repository::AuditRepository;
use crate::service::processor::{EventSink, NarrativeAnalyzer, PageSource};
use crate::service::JobProcessor;

/// Initialize logging with tracing_subscriber. Safe to call more than once.
pub fn init_logging() {
    let mut filter = EnvFilter::from_default_env();
    for directive in ["seo_audit=debug", "info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .with_target(false)
        .with_ansi(true)
        .try_init();
}

/// Collaborators the engine is wired to.
pub struct Collaborators {
    pub source: Arc<dyn PageSource>,
    pub narrative: Option<Arc<dyn NarrativeAnalyzer>>,
    pub repository: Arc<dyn AuditRepository>,
    pub sink: Arc<dyn EventSink>,
}

/// Builds the processor, starts its workers and returns the API surface.
pub fn setup(config: EngineConfig, collaborators: Collaborators) -> (Arc<JobProcessor>, AuditService) {
    let processor = Arc::new(JobProcessor::new(
        config,
        collaborators.source,
        collaborators.narrative,
        collaborators.repository,
        collaborators.sink,
    ));
    processor.start();

    let service = AuditService::new(processor.clone());
    (processor, service)
}

/// Gracefully shutdown the worker pool.
pub async fn shutdown(processor: &JobProcessor) {
    processor.shutdown().await;
}
