use crate::error::{ErrorCode, RefreshError};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Process timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to spawn '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error while running '{command}': {source}")]
    IoError {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {message}")]
    InternalError { message: String },

    #[error("Mock expectation not met: {0}")]
    MockExpectationNotMet(String),
}

/// Convert ProcessError to RefreshError
///
/// A missing client program means no session can ever be opened, so it is a
/// connection error; everything else happens on an open session.
impl From<ProcessError> for RefreshError {
    fn from(err: ProcessError) -> Self {
        let message = err.to_string();
        match &err {
            ProcessError::CommandNotFound(_) => {
                RefreshError::connection(ErrorCode::CONNECTION_CLIENT_NOT_FOUND, message, None)
            }
            ProcessError::SpawnFailed { .. } => {
                RefreshError::connection(ErrorCode::CONNECTION_GENERIC, message, None)
            }
            ProcessError::Timeout(_) => {
                RefreshError::session(ErrorCode::SESSION_TIMEOUT, message, None)
            }
            ProcessError::IoError { .. } | ProcessError::Io(_) => {
                RefreshError::session(ErrorCode::SESSION_IO_ERROR, message, None)
            }
            ProcessError::InternalError { .. } | ProcessError::MockExpectationNotMet(_) => {
                RefreshError::session(ErrorCode::SESSION_GENERIC, message, None)
            }
        }
        .with_source(err)
    }
}
