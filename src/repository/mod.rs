pub mod json_file;
pub mod memory;

pub use json_file::JsonFileRepository;
pub use memory::MemoryRepository;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::models::AuditJob;

/// Durable storage for finished audit records.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Inserts or replaces the whole record.
    async fn save(&self, job: &AuditJob) -> Result<()>;
    async fn load(&self, id: &Uuid) -> Result<Option<AuditJob>>;
    /// Returns whether a record existed.
    async fn delete(&self, id: &Uuid) -> Result<bool>;
    async fn list_ids(&self) -> Result<Vec<Uuid>>;
}
