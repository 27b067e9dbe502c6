use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::{fs, io::AsyncWriteExt};

use super::{BlobStore, StorageError, StoredBlob};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

// Local filesystem storage.
// Blobs live under `{base}/files/{key}`, their content types under `{base}/meta/{key}`.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Creates a new LocalStorage instance and ensures necessary directories exist
    pub async fn new(base_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(base_path.join("files")).await?;
        fs::create_dir_all(base_path.join("meta")).await?;
        Ok(Self { base_path })
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.base_path.join("files").join(key)
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.base_path.join("meta").join(key)
    }

    async fn write_blob(
        &self,
        blob_path: &Path,
        key: &str,
        content: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        let mut file = fs::File::create(blob_path).await?;
        file.write_all(content).await?;
        file.flush().await?;

        fs::write(self.meta_path(key), content_type.as_bytes()).await?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for LocalStorage {
    async fn put(&self, key: &str, content: Bytes, content_type: &str) -> Result<(), StorageError> {
        let blob_path = self.blob_path(key);

        // A half-written put must not leave a blob behind.
        if let Err(e) = self.write_blob(&blob_path, key, &content, content_type).await {
            match fs::remove_file(&blob_path).await {
                Ok(()) => {}
                Err(cleanup) if cleanup.kind() == std::io::ErrorKind::NotFound => {}
                Err(cleanup) => {
                    tracing::error!("Failed to remove partial blob {}: {}", key, cleanup)
                }
            }
            return Err(e);
        }

        tracing::info!("Saved blob at {:?}", blob_path);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<StoredBlob, StorageError> {
        let blob_path = self.blob_path(key);

        let content = match fs::read(&blob_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(StorageError::IoError(e)),
        };

        let content_type = fs::read_to_string(self.meta_path(key))
            .await
            .map(|ct| ct.trim().to_string())
            .unwrap_or_else(|_| DEFAULT_CONTENT_TYPE.to_string());

        Ok(StoredBlob {
            content: Bytes::from(content),
            content_type,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        for path in [self.blob_path(key), self.meta_path(key)] {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StorageError::IoError(e)),
            }
        }
        Ok(())
    }
}
