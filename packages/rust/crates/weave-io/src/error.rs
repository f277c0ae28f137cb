//! Error types for note reads and watching.

use std::path::PathBuf;
use thiserror::Error;

/// Failure modes of the read and watch pipeline.
#[derive(Error, Debug)]
pub enum IoError {
    /// File does not exist.
    #[error("File not found: {0}")]
    NotFound(String),

    /// File exceeds size limit.
    #[error("File too large: {0} bytes (limit: {1})")]
    TooLarge(u64, u64),

    /// File contains binary content (NULL bytes detected).
    #[error("Binary file detected")]
    BinaryFile,

    /// Low-level I/O error from `std::io`.
    #[error("IO error: {0}")]
    System(#[from] std::io::Error),

    /// Invalid UTF-8 encoding.
    #[error("UTF-8 decoding error")]
    Encoding,

    /// Transient failures outlasted the retry policy.
    #[error("Gave up reading {path} after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// File that could not be read.
        path: PathBuf,
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        last: Box<IoError>,
    },

    /// Watcher could not be created or attached.
    #[error("Watch error: {0}")]
    Watch(String),
}

impl IoError {
    /// Whether a retry might succeed (file briefly missing or locked).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::System(_))
    }
}

impl From<notify::Error> for IoError {
    fn from(err: notify::Error) -> Self {
        Self::Watch(err.to_string())
    }
}
