//! Error types for the SEO audit engine.
//!
//! This module provides structured error handling with:
//! - `AppError`: Domain-specific errors for audit operations
//! - `CommandError`: Wrapper for errors returned from the API surface (serializable)
//! - `Result<T>`: Type alias for Results using AppError

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::JobStatus;

// ============================================================================
// DOMAIN ERROR TYPE
// ============================================================================

/// Domain-specific errors for audit operations.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed submission, rejected before any job record exists
    #[error("Invalid submission: {0}")]
    InvalidSubmission(String),

    /// Invalid or malformed URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Job not found
    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    /// Attempted a status edge the lifecycle does not allow
    #[error("Invalid status transition: {from:?} -> {to:?}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    /// A single page could not be fetched
    #[error("Fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    /// Rule evaluation for a single page blew up
    #[error("Analysis failed for {url}: {message}")]
    Analysis { url: String, message: String },

    /// The job as a whole cannot make progress
    #[error("Job failed: {0}")]
    JobFailed(String),

    /// Wall-clock safety net elapsed
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Job was cancelled
    #[error("Job cancelled")]
    Cancelled,

    /// Persistence collaborator failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Invalid engine configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Create a submission validation error
    pub fn invalid_submission(msg: impl Into<String>) -> Self {
        Self::InvalidSubmission(msg.into())
    }

    /// Create a fetch error
    pub fn fetch(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create an analysis error
    pub fn analysis(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Analysis {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }
}

/// Result type alias using AppError.
pub type Result<T> = std::result::Result<T, AppError>;

// ============================================================================
// API ERROR
// ============================================================================

/// Wrapper for errors returned from the API surface.
/// This type is serializable and can be sent to any caller as a plain message.
#[derive(Debug)]
pub struct CommandError(pub anyhow::Error);

impl std::error::Error for CommandError {}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for CommandError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&format!("{:#}", self.0))
    }
}

impl CommandError {
    /// Returns the domain error when this wraps one.
    pub fn app_error(&self) -> Option<&AppError> {
        self.0.downcast_ref::<AppError>()
    }
}

impl From<anyhow::Error> for CommandError {
    fn from(error: anyhow::Error) -> Self {
        Self(error)
    }
}

impl From<AppError> for CommandError {
    fn from(error: AppError) -> Self {
        Self(error.into())
    }
}
