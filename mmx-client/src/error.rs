//! Error types for mmx-client

use thiserror::Error;

use crate::mutator::PlaylistCommand;

/// Main error type for client operations
#[derive(Error, Debug)]
pub enum Error {
    /// The query collaborator failed; nothing was sent to the playlist
    #[error("Query failed: {0}")]
    Query(#[source] mmx_common::Error),

    /// A batch stopped part way; the first `applied` steps remain applied
    #[error("Step {step} ({command}) failed after {applied} applied step(s): {source}")]
    Batch {
        step: usize,
        command: PlaylistCommand,
        applied: usize,
        #[source]
        source: mmx_common::Error,
    },

    /// The playlist cache was invalidated by a change notification and must
    /// be refreshed before its indices are used again
    #[error("Playlist cache is stale, refresh it first")]
    StaleCache,

    /// Target name is already taken and overwriting was not requested
    #[error("A collection already exists with the name {0}")]
    AlreadyExists(String),

    /// Unparseable playlist position list
    #[error("Invalid positions: {0}")]
    InvalidPositions(String),

    /// Any other daemon-side failure
    #[error(transparent)]
    Common(#[from] mmx_common::Error),
}

/// Convenience Result type using the client Error
pub type Result<T> = std::result::Result<T, Error>;
