pub mod issues;
pub mod processor;
pub mod report;
pub mod rules;
pub mod scoring;

pub use issues::{AnalyzerIssue, NarrativeFindings};
pub use processor::JobProcessor;
pub use report::{AuditReport, ReportBuilder};
pub use scoring::ScoringPolicy;
