//! Photo metadata persistence.
//!
//! The ingestion handlers are the only writers. Two backends exist: SQLite
//! through sqlx, and an in-memory table for development and tests.

mod memory;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

pub use memory::MemoryMetadataStore;
pub use sqlite::SqliteMetadataStore;

use crate::{
    config::{Config, MetadataKind},
    models::PhotoRecord,
};

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("Photo {0} already exists")]
    Duplicate(String),

    #[error("Corrupt row {id}: {reason}")]
    CorruptRow { id: String, reason: String },

    #[error("Metadata store unavailable: {0}")]
    Unavailable(String),
}

/// The `photos` table.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a new row. Ids are unique; a duplicate is an error.
    async fn insert(&self, record: &PhotoRecord) -> Result<(), MetadataError>;

    /// All rows, newest `created_at` first.
    async fn list(&self) -> Result<Vec<PhotoRecord>, MetadataError>;

    async fn find(&self, id: &str) -> Result<Option<PhotoRecord>, MetadataError>;

    /// Remove a row. Returns whether a row was removed.
    async fn delete(&self, id: &str) -> Result<bool, MetadataError>;
}

/// Initialize the metadata store selected by `METADATA_BACKEND`.
pub async fn init_metadata(config: &Config) -> Result<Arc<dyn MetadataStore>, MetadataError> {
    let store: Arc<dyn MetadataStore> = match config.metadata_backend {
        MetadataKind::Sqlite => Arc::new(SqliteMetadataStore::connect(&config.database_url).await?),
        MetadataKind::Memory => {
            info!("Using in-memory metadata store; records are lost on restart");
            Arc::new(MemoryMetadataStore::new())
        }
    };
    Ok(store)
}
