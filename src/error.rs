use std::path::PathBuf;

use thiserror::Error;

/// Every failure the updater can surface.
///
/// `ArchiveEntry` is the only kind recovered in place (see [`crate::archive`]);
/// everything else aborts the run.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("invalid patch manifest: {0}")]
    ManifestFormat(String),

    #[error("invalid file entry {url}: {reason}")]
    FileSpec { url: String, reason: String },

    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("network error for {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("file hash does not match for {file}: expected {expected}, got {actual}")]
    Integrity {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("could not open archive {path:?}: {reason}")]
    ArchiveOpen { path: PathBuf, reason: String },

    #[error("corrupted archive entry {entry}: {reason}")]
    ArchiveEntry { entry: String, reason: String },

    #[error("invalid launcher config {path:?}: {reason}")]
    Config { path: PathBuf, reason: String },
}

pub type UpdateResult<T> = Result<T, UpdateError>;

impl UpdateError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        UpdateError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn network(url: &str, reason: impl ToString) -> Self {
        UpdateError::Network {
            url: url.to_owned(),
            reason: reason.to_string(),
        }
    }
}
