//! Common error types for mmx

use crate::command::CommandId;
use crate::value::ValueType;
use thiserror::Error;

/// Common result type for mmx operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the daemon and its clients
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// I/O operation error (message of the underlying std::io::Error)
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A tagged value was read as a different type than it was written with
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: ValueType,
        found: ValueType,
    },

    /// No handler registered for the command on the target object
    #[error("Unimplemented command: {0}")]
    Unimplemented(CommandId),

    /// Wrong number of arguments for a command
    #[error("Command {command} takes {expected} argument(s), got {found}")]
    ArgumentCount {
        command: CommandId,
        expected: usize,
        found: usize,
    },

    /// Failure reported by a command handler
    #[error("Command failed: {0}")]
    Command(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl Error {
    /// Shorthand for handler failures
    pub fn command(msg: impl Into<String>) -> Self {
        Error::Command(msg.into())
    }
}
