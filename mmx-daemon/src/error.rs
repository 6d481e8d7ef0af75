//! Error types for mmx-daemon
//!
//! Command handlers report failures with `mmx_common::Error` so they can
//! travel back to clients unchanged; this type covers daemon startup and
//! persistence.

use thiserror::Error;

/// Main error type for the daemon
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from the shared bus/value layer
    #[error(transparent)]
    Common(#[from] mmx_common::Error),

    /// Daemon could not be brought up
    #[error("Startup error: {0}")]
    Startup(String),
}

/// Convenience Result type using the daemon Error
pub type Result<T> = std::result::Result<T, Error>;
