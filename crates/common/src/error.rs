//! Error types for Packhash

use thiserror::Error;

/// Result type alias using Packhash Error
pub type Result<T> = std::result::Result<T, Error>;

/// Packhash error types
///
/// "Not an archive" is deliberately absent: archive mode reports it through
/// [`crate::builder::ArchiveOutcome::NotAnArchive`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to read {path}: {source}")]
    StreamRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive error: {0}")]
    ArchiveProtocol(String),

    #[error("Directory traversal failed: {0}")]
    Traversal(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap a read failure with the path of the entry being read
    pub fn stream_read(path: impl Into<String>, source: std::io::Error) -> Self {
        Error::StreamRead {
            path: path.into(),
            source,
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::ArchiveProtocol(e.to_string())
    }
}

impl From<walkdir::Error> for Error {
    fn from(e: walkdir::Error) -> Self {
        Error::Traversal(e.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Internal(format!("task failed: {}", e))
    }
}
