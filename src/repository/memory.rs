use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::AuditRepository;
use crate::domain::models::AuditJob;

#[derive(Default)]
pub struct MemoryRepository {
    records: DashMap<Uuid, AuditJob>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl AuditRepository for MemoryRepository {
    async fn save(&self, job: &AuditJob) -> Result<()> {
        self.records.insert(job.id, job.clone());
        Ok(())
    }

    async fn load(&self, id: &Uuid) -> Result<Option<AuditJob>> {
        Ok(self.records.get(id).map(|job| job.value().clone()))
    }

    async fn delete(&self, id: &Uuid) -> Result<bool> {
        Ok(self.records.remove(id).is_some())
    }

    async fn list_ids(&self) -> Result<Vec<Uuid>> {
        Ok(self.records.iter().map(|entry| *entry.key()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_replaces_record() {
        let repo = MemoryRepository::new();
        let mut job = AuditJob::new("acme", "https://example.com");
        repo.save(&job).await.unwrap();

        job.error = Some("boom".into());
        repo.save(&job).await.unwrap();

        assert_eq!(repo.len(), 1);
        let loaded = repo.load(&job.id).await.unwrap().unwrap();
        assert_eq!(loaded.error.as_deref(), Some("boom"));
        assert!(repo.delete(&job.id).await.unwrap());
        assert!(repo.load(&job.id).await.unwrap().is_none());
    }
}
