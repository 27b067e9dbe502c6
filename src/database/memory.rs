use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{MetadataError, MetadataStore};
use crate::models::PhotoRecord;

/// In-process stand-in for the `photos` table.
#[derive(Clone, Default)]
pub struct MemoryMetadataStore {
    rows: Arc<RwLock<Vec<PhotoRecord>>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn insert(&self, record: &PhotoRecord) -> Result<(), MetadataError> {
        let mut rows = self.rows.write().await;
        if rows.iter().any(|row| row.id == record.id) {
            return Err(MetadataError::Duplicate(record.id.clone()));
        }
        rows.push(record.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<PhotoRecord>, MetadataError> {
        let mut rows = self.rows.read().await.clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn find(&self, id: &str) -> Result<Option<PhotoRecord>, MetadataError> {
        Ok(self.rows.read().await.iter().find(|row| row.id == id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<bool, MetadataError> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|row| row.id != id);
        Ok(rows.len() != before)
    }
}
