//! Error taxonomy shared by push, pull and diff.
//!
//! - local I/O and JSON problems are per-entry ([`SyncError::Io`], [`SyncError::Json`])
//! - vendor failures are per-entry ([`SyncError::Api`])
//! - configuration problems are fatal for the whole run ([`SyncError::Config`], [`SyncError::Yaml`])

use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by a [`crate::contract::ModelApi`] implementation.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("data model not found: {0}")]
    NotFound(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Classify a non-success HTTP status and its body.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 | 403 => ApiError::Auth(body),
            404 => ApiError::NotFound(body),
            429 => ApiError::RateLimited(body),
            _ => ApiError::Rejected { status, body },
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid data model document: {0}")]
    Document(String),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(
        "folderId is required to create {file}: set folder_id on the entry, \
         default_folder_id in the config, or SIGMA_FOLDER_ID"
    )]
    MissingFolder { file: String },

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("git error: {0}")]
    Git(String),
}

impl SyncError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        SyncError::Json {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
