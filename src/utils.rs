use std::{
    path::Path,
    sync::atomic::{AtomicI64, Ordering},
};

use chrono::Utc;

/// Extension used for uploads whose filename has none.
pub const FALLBACK_EXTENSION: &str = "bin";

/// Extracts the file extension from a filename and converts it to lowercase.
pub fn get_file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_lowercase())
}

/// Builds the blob key for a freshly generated id: `{id}.{ext}`.
pub fn storage_key(id: &str, original_filename: Option<&str>) -> String {
    let extension = original_filename
        .and_then(get_file_extension)
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string());
    format!("{}.{}", id, extension)
}

/// Public URL of a blob: configured base plus the storage key.
pub fn public_url(base_url: &str, key: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), key)
}

/// Recovers the storage key from a stored public URL (suffix after the last `/`).
pub fn key_from_url(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// Keys are generated by us, so anything that could escape a directory is refused.
pub fn is_valid_storage_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_')
}

/// Checks if a MIME type is something guests may upload.
pub fn is_accepted_media_type(mime_type: &str) -> bool {
    mime_type.starts_with("image/") || mime_type.starts_with("video/")
}

/// Declared content type if present, otherwise a guess from the filename.
pub fn resolve_content_type(declared: Option<&str>, filename: Option<&str>) -> String {
    match declared.map(str::trim).filter(|ct| !ct.is_empty()) {
        Some(ct) => ct.to_lowercase(),
        None => filename
            .and_then(|name| mime_guess::from_path(name).first())
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string()),
    }
}

/// Millisecond clock that never hands out the same value twice.
///
/// Values follow wall-clock time but are bumped by one millisecond whenever
/// two ingestions land in the same tick, so `created_at` ordering matches
/// insertion order within a process.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_millis(&self) -> i64 {
        let wall = Utc::now().timestamp_millis();
        let mut previous = self.last.load(Ordering::Relaxed);
        loop {
            let next = wall.max(previous + 1);
            match self
                .last
                .compare_exchange_weak(previous, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => previous = actual,
            }
        }
    }
}
