//! Centralized error types for inboxkit.
//!
//! The pipeline itself is total; only the file-facing edges (EML ingestion,
//! JSON loading, configuration) produce errors.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the inboxkit library.
#[derive(Error, Debug)]
pub enum InboxError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// A JSON input file could not be decoded into the expected records.
    #[error("Invalid JSON in '{path}': {source}")]
    InvalidJson {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The bytes do not form a usable RFC 5322 message.
    #[error("Invalid EML message: {0}")]
    InvalidEml(String),

    /// The configuration file could not be parsed.
    #[error("Invalid configuration in '{path}': {reason}")]
    Config { path: PathBuf, reason: String },
}

/// Convenience alias for `Result<T, InboxError>`.
pub type Result<T> = std::result::Result<T, InboxError>;

impl InboxError {
    /// Create an `Io` variant from a path and an `io::Error`, mapping
    /// `NotFound` to [`InboxError::FileNotFound`].
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            return Self::FileNotFound(path);
        }
        Self::Io { path, source }
    }
}

/// Read a JSON array of records from disk.
pub fn read_json_file<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> Result<T> {
    let data = std::fs::read(path).map_err(|e| InboxError::io(path, e))?;
    serde_json::from_slice(&data).map_err(|source| InboxError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })
}
