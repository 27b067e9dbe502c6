use std::{fmt, time::Duration};

use thiserror::Error;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use super::{ClientError, LocalFile, MAX_UPLOAD_BYTES, PhotoApi, SimulatedProgress};
use crate::models::PhotoRecord;

const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Selected,
    Uploading,
    Success,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Selected => "selected",
            SessionState::Uploading => "uploading",
            SessionState::Success => "success",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("cannot {action} while the session is {state}")]
    InvalidState {
        action: &'static str,
        state: SessionState,
    },

    #[error("no file at position {0}")]
    NoSuchFile(usize),
}

/// A picked file that was left out of the pending set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionWarning {
    pub name: String,
    pub content_type: String,
}

impl fmt::Display for SelectionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} is not a photo or video ({}) and was skipped",
            self.name, self.content_type
        )
    }
}

/// What happens during [`UploadSession::submit`], in order.
#[derive(Debug)]
pub enum UploadEvent<'a> {
    Started { index: usize, file: &'a LocalFile },
    Progress { index: usize, percent: u8 },
    Uploaded { index: usize, record: &'a PhotoRecord },
    Failed { index: usize, file: &'a LocalFile, error: &'a ClientError },
    /// At least one file made it; the caller may stop offering "add more".
    BatchCompleted { uploaded: usize, failed: usize },
    /// One-shot, right after `BatchCompleted`.
    Celebrate,
    NothingUploaded { failed: usize },
}

pub trait UploadObserver {
    fn on_event(&mut self, event: UploadEvent<'_>);
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl UploadObserver for NoopObserver {
    fn on_event(&mut self, _event: UploadEvent<'_>) {}
}

#[derive(Debug)]
pub struct FailedUpload {
    pub file: LocalFile,
    pub error: ClientError,
}

/// Outcome of one batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub uploaded: Vec<PhotoRecord>,
    pub failed: Vec<FailedUpload>,
}

impl BatchReport {
    pub fn succeeded(&self) -> bool {
        !self.uploaded.is_empty()
    }
}

/// One guest's upload session: pick files, submit them, start over.
#[derive(Debug)]
pub struct UploadSession {
    state: SessionState,
    pending: Vec<LocalFile>,
    progress: Vec<u8>,
    progress_interval: Duration,
}

impl Default for UploadSession {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            pending: Vec::new(),
            progress: Vec::new(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    /// How often the simulated progress ticks while a request is in flight.
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn pending(&self) -> &[LocalFile] {
        &self.pending
    }

    /// Progress of each file in the last or current batch, in batch order.
    pub fn progress(&self) -> &[u8] {
        &self.progress
    }

    /// Append picked files to the pending set, skipping anything that is not
    /// an image or video.
    pub fn select<I>(&mut self, files: I) -> Result<Vec<SelectionWarning>, SessionError>
    where
        I: IntoIterator<Item = LocalFile>,
    {
        if !matches!(self.state, SessionState::Idle | SessionState::Selected) {
            return Err(SessionError::InvalidState {
                action: "select files",
                state: self.state,
            });
        }

        let mut warnings = Vec::new();
        for file in files {
            if file.is_media() {
                self.pending.push(file);
            } else {
                warn!("Skipping {}: unsupported type {}", file.name, file.content_type);
                warnings.push(SelectionWarning {
                    name: file.name,
                    content_type: file.content_type,
                });
            }
        }

        self.state = if self.pending.is_empty() {
            SessionState::Idle
        } else {
            SessionState::Selected
        };
        Ok(warnings)
    }

    /// Drop one pending file; an emptied selection goes back to idle.
    pub fn remove(&mut self, index: usize) -> Result<LocalFile, SessionError> {
        if self.state != SessionState::Selected {
            return Err(SessionError::InvalidState {
                action: "remove a file",
                state: self.state,
            });
        }
        if index >= self.pending.len() {
            return Err(SessionError::NoSuchFile(index));
        }

        let removed = self.pending.remove(index);
        if self.pending.is_empty() {
            self.state = SessionState::Idle;
        }
        Ok(removed)
    }

    /// After a successful batch, start a new selection.
    pub fn add_more(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Success {
            return Err(SessionError::InvalidState {
                action: "add more",
                state: self.state,
            });
        }
        self.state = SessionState::Idle;
        self.progress.clear();
        Ok(())
    }

    /// Upload every pending file, one request at a time, in selection order.
    ///
    /// A failed file never stops the batch. The session ends in `Success` if
    /// at least one file was stored, otherwise back in `Idle`.
    pub async fn submit<A, O>(&mut self, api: &A, observer: &mut O) -> Result<BatchReport, SessionError>
    where
        A: PhotoApi + ?Sized,
        O: UploadObserver + ?Sized,
    {
        if self.state != SessionState::Selected {
            return Err(SessionError::InvalidState {
                action: "submit",
                state: self.state,
            });
        }

        let files = std::mem::take(&mut self.pending);
        self.state = SessionState::Uploading;
        self.progress = vec![0; files.len()];

        info!("Uploading batch of {} file(s)", files.len());

        let mut report = BatchReport::default();
        for (index, file) in files.into_iter().enumerate() {
            observer.on_event(UploadEvent::Started { index, file: &file });

            let result = if file.size > MAX_UPLOAD_BYTES {
                Err(ClientError::TooLarge {
                    name: file.name.clone(),
                    size: file.size,
                    limit: MAX_UPLOAD_BYTES,
                })
            } else {
                self.upload_one(api, index, &file, observer).await
            };

            match result {
                Ok(record) => {
                    self.progress[index] = 100;
                    observer.on_event(UploadEvent::Progress { index, percent: 100 });
                    observer.on_event(UploadEvent::Uploaded { index, record: &record });
                    debug!("Uploaded {} as {}", file.name, record.id);
                    report.uploaded.push(record);
                }
                Err(error) => {
                    warn!("Upload of {} failed: {}", file.name, error);
                    observer.on_event(UploadEvent::Failed {
                        index,
                        file: &file,
                        error: &error,
                    });
                    report.failed.push(FailedUpload { file, error });
                }
            }
        }

        if report.succeeded() {
            self.state = SessionState::Success;
            observer.on_event(UploadEvent::BatchCompleted {
                uploaded: report.uploaded.len(),
                failed: report.failed.len(),
            });
            observer.on_event(UploadEvent::Celebrate);
        } else {
            self.state = SessionState::Idle;
            observer.on_event(UploadEvent::NothingUploaded {
                failed: report.failed.len(),
            });
        }

        info!(
            "Batch finished: {} uploaded, {} failed",
            report.uploaded.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Send one file while ticking the simulated progress for it.
    async fn upload_one<A, O>(
        &mut self,
        api: &A,
        index: usize,
        file: &LocalFile,
        observer: &mut O,
    ) -> Result<PhotoRecord, ClientError>
    where
        A: PhotoApi + ?Sized,
        O: UploadObserver + ?Sized,
    {
        let mut progress = SimulatedProgress::new();
        let mut ticker = time::interval_at(
            Instant::now() + self.progress_interval,
            self.progress_interval,
        );

        let upload = api.upload(file);
        tokio::pin!(upload);

        loop {
            tokio::select! {
                result = &mut upload => return result,
                _ = ticker.tick() => {
                    let percent = progress.advance();
                    self.progress[index] = percent;
                    observer.on_event(UploadEvent::Progress { index, percent });
                }
            }
        }
    }
}
