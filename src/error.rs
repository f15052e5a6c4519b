//! Centralized error types for receiptbox.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the receiptbox library.
#[derive(Error, Debug)]
pub enum ReceiptError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("Message file not found: {0}")]
    FileNotFound(PathBuf),

    /// The file could not be read as an email message.
    #[error("Not a readable email message: {0}")]
    InvalidMessage(PathBuf),

    /// The preview service rejected a request or was unreachable.
    #[error("Preview service error: {0}")]
    Preview(String),

    /// The external renderer failed to produce a document.
    #[error("Render error: {0}")]
    Render(String),

    /// The configuration is semantically invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Convenience alias for `Result<T, ReceiptError>`.
pub type Result<T> = std::result::Result<T, ReceiptError>;

impl ReceiptError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for ReceiptError {
    fn from(source: reqwest::Error) -> Self {
        Self::Preview(source.to_string())
    }
}
