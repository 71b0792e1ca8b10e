//! Error types shared across JukeQ crates

use thiserror::Error;

/// Error type for jukeq-common
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading or writing errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed queue entry line
    #[error("Malformed entry line: {0}")]
    MalformedLine(String),
}

/// Convenience Result type using jukeq-common Error
pub type Result<T> = std::result::Result<T, Error>;
