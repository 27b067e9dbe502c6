//! Guest-side upload flow.
//!
//! [`UploadSession`] owns the pending file list and drives one batch at a
//! time through a [`PhotoApi`]; [`HttpPhotoApi`] talks to the ingestion
//! endpoint over HTTP.

mod api;
mod progress;
mod session;

use std::path::{Path, PathBuf};

pub use api::{ClientError, HttpPhotoApi, PhotoApi};
pub use progress::SimulatedProgress;
pub use session::{
    BatchReport, FailedUpload, NoopObserver, SelectionWarning, SessionError, SessionState,
    UploadEvent, UploadObserver, UploadSession,
};

/// Files above this size are never sent (100 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// A file on disk the guest picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub path: PathBuf,
    pub name: String,
    pub content_type: String,
    pub size: u64,
}

impl LocalFile {
    /// Stat `path` and guess its content type from the extension.
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let content_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self {
            path,
            name,
            content_type,
            size: metadata.len(),
        })
    }

    pub fn is_media(&self) -> bool {
        crate::utils::is_accepted_media_type(&self.content_type)
    }
}
