// Submodules for local file system, S3 and in-memory blob storage
mod local;
mod memory;
mod s3;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::info;

pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use s3::S3Storage;

use crate::config::{Config, StorageKind};

// Storage error types
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Io Error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Upload Error: {0}")]
    UploadError(String),

    #[error("Download Error: {0}")]
    DownloadError(String),

    #[error("Delete Error: {0}")]
    DeleteError(String),
}

/// Blob bytes together with the content type recorded at upload time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub content: Bytes,
    pub content_type: String,
}

/// Write-once-by-key binary storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `content` under `key`, remembering its content type.
    async fn put(&self, key: &str, content: Bytes, content_type: &str) -> Result<(), StorageError>;

    /// Fetch a blob and its content type.
    async fn get(&self, key: &str) -> Result<StoredBlob, StorageError>;

    /// Delete a blob. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Initialize the blob store selected by `STORAGE_BACKEND`.
pub async fn init_storage(config: &Config) -> Result<Arc<dyn BlobStore>, StorageError> {
    let storage: Arc<dyn BlobStore> = match config.storage_backend {
        StorageKind::S3 => {
            info!("Initializing S3 storage");
            Arc::new(S3Storage::new(config).await)
        }
        StorageKind::Local => {
            info!("Initializing Local storage at {}", config.local_storage_dir);
            Arc::new(LocalStorage::new(&config.local_storage_dir).await?)
        }
        StorageKind::Memory => {
            info!("Initializing in-memory storage; blobs are lost on restart");
            Arc::new(MemoryStorage::new())
        }
    };
    Ok(storage)
}
