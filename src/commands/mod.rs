pub mod audit;

pub use audit::{AuditService, JobStatusResponse, SubmitAuditRequest, SubmitAuditResponse};
