use crate::sync::SyncError;
use thiserror::Error;

/// Failures that can surface from setup and explicit user actions. The
/// timer and flush paths never produce these.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("encryption error: {0}")]
    Crypto(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("project not found: {0}")]
    ProjectNotFound(String),
}

pub type TrackerResult<T> = Result<T, TrackerError>;
