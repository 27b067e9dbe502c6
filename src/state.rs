use std::sync::Arc;

use crate::{
    config::Config, database::MetadataStore, storage::BlobStore, utils::MonotonicClock,
};

/// Central application state shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Photo metadata rows.
    pub metadata: Arc<dyn MetadataStore>,

    /// Abstracted blob backend (local filesystem, S3 or memory).
    pub storage: Arc<dyn BlobStore>,

    /// Application configuration loaded from environment variables or `.env`.
    pub config: Arc<Config>,

    /// Source of `created_at` values.
    pub clock: Arc<MonotonicClock>,
}

impl AppState {
    pub fn new(config: Config, metadata: Arc<dyn MetadataStore>, storage: Arc<dyn BlobStore>) -> Self {
        Self {
            metadata,
            storage,
            config: Arc::new(config),
            clock: Arc::new(MonotonicClock::new()),
        }
    }
}
