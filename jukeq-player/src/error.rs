//! Error types for jukeq-player
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation. The four domain errors (resolution, download, store
//! corruption, filler config) map directly onto the daemon's retry policy:
//! resolution failures are reported to the caller, download failures are
//! retried on the next scheduling cycle, store corruption aborts the
//! mutation with the file restored, and filler failures disable the filler.

use thiserror::Error;

/// Main error type for jukeq-player
#[derive(Error, Debug)]
pub enum Error {
    /// URL could not be resolved to playable media
    #[error("Unresolvable media URL: {0}")]
    Resolution(String),

    /// Media fetch failed; slot left empty, retried next cycle
    #[error("Media download failed: {0}")]
    Download(String),

    /// Queue file head line unparsable; original content restored
    #[error("Queue store corruption: {0}")]
    StoreCorruption(String),

    /// Filler source length could not be resolved
    #[error("Filler source unavailable: {0}")]
    FillerConfig(String),

    /// Playback device errors
    #[error("Playback device error: {0}")]
    Device(String),

    /// External archiver errors
    #[error("Archive error: {0}")]
    Archive(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] jukeq_common::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid request parameters
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience Result type using jukeq-player Error
pub type Result<T> = std::result::Result<T, Error>;
