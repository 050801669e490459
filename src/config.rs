//! Engine configuration.
//!
//! Loaded from a JSON file (path in `SEO_AUDIT_CONFIG`) with a couple of
//! environment overrides on top. Every field has a default, so an empty
//! object is a valid config.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::service::processor::queue::JOB_POLL_INTERVAL;
use crate::service::scoring::ScoringPolicy;

pub const CONFIG_PATH_ENV: &str = "SEO_AUDIT_CONFIG";
pub const WORKERS_ENV: &str = "SEO_AUDIT_WORKERS";
pub const MAX_CONCURRENT_PAGES_ENV: &str = "SEO_AUDIT_MAX_CONCURRENT_PAGES";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker tasks claiming queued jobs.
    pub workers: usize,
    /// Pages in flight per job.
    pub max_concurrent_pages: usize,
    pub job_timeout_secs: u64,
    pub page_timeout_secs: u64,
    pub max_pages: usize,
    /// Idle workers re-check the queue at least this often.
    pub poll_interval_ms: u64,
    pub scoring_policy: ScoringPolicy,
    pub narrative_analysis: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().clamp(1, 4),
            max_concurrent_pages: 4,
            job_timeout_secs: 600,
            page_timeout_secs: 60,
            max_pages: 500,
            poll_interval_ms: JOB_POLL_INTERVAL.as_millis() as u64,
            scoring_policy: ScoringPolicy::Lenient,
            narrative_analysis: true,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let config: EngineConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults, or the file named by `SEO_AUDIT_CONFIG`, plus env overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::load(Path::new(&path))?,
            None => Self::default(),
        };

        if let Some(workers) = env_usize(WORKERS_ENV)? {
            config.workers = workers;
        }
        if let Some(pages) = env_usize(MAX_CONCURRENT_PAGES_ENV)? {
            config.max_concurrent_pages = pages;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let zero = [
            ("workers", self.workers as u64),
            ("max_concurrent_pages", self.max_concurrent_pages as u64),
            ("job_timeout_secs", self.job_timeout_secs),
            ("page_timeout_secs", self.page_timeout_secs),
            ("max_pages", self.max_pages as u64),
            ("poll_interval_ms", self.poll_interval_ms),
        ]
        .into_iter()
        .find(|(_, value)| *value == 0);

        match zero {
            Some((field, _)) => Err(AppError::Config(format!("{field} must be greater than 0"))),
            None => Ok(()),
        }
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn env_usize(name: &str) -> Result<Option<usize>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AppError::Config(format!("{name} must be a positive integer, got '{raw}'"))),
        Err(_) => Ok(None),
    }
}
