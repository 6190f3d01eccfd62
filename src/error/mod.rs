use std::error::Error as StdError;
use std::fmt::Display;
use std::path::PathBuf;
use thiserror::Error;

pub mod codes;

pub use codes::{describe_error_code, ErrorCode};

type BoxedSource = Box<dyn StdError + Send + Sync>;

/// The unified error type for a refresh run
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("[E{code:04}] Configuration error: {message}")]
    Config {
        code: u16,
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Connection error: {message}")]
    Connection {
        code: u16,
        message: String,
        host: Option<String>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Session error: {message}")]
    Session {
        code: u16,
        message: String,
        host: Option<String>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Remote command failed: {message}")]
    Command {
        code: u16,
        message: String,
        step: Option<String>,
        exit_code: Option<i32>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Workflow error: {message}")]
    Workflow {
        code: u16,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Validation error: {message}")]
    Validation {
        code: u16,
        message: String,
        field: Option<String>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] {message}")]
    Other {
        code: u16,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
}

impl RefreshError {
    /// Create a configuration error with default code
    pub fn config(message: impl Into<String>) -> Self {
        Self::config_with_code(ErrorCode::CONFIG_GENERIC, message)
    }

    /// Create a configuration error with specific code
    pub fn config_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Config {
            code,
            message: message.into(),
            path: None,
            source: None,
        }
    }

    /// Create a connection error for a host
    pub fn connection(code: u16, message: impl Into<String>, host: Option<String>) -> Self {
        Self::Connection {
            code,
            message: message.into(),
            host,
            source: None,
        }
    }

    /// Create a session error for a host
    pub fn session(code: u16, message: impl Into<String>, host: Option<String>) -> Self {
        Self::Session {
            code,
            message: message.into(),
            host,
            source: None,
        }
    }

    /// Create a remote command error attributed to a refresh step
    pub fn command(code: u16, message: impl Into<String>, step: impl Into<String>) -> Self {
        Self::Command {
            code,
            message: message.into(),
            step: Some(step.into()),
            exit_code: None,
            source: None,
        }
    }

    /// Create a workflow error with specific code
    pub fn workflow(code: u16, message: impl Into<String>) -> Self {
        Self::Workflow {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create a validation error with default code
    pub fn validation(message: impl Into<String>) -> Self {
        Self::validation_with_code(ErrorCode::VALIDATION_GENERIC, message, None)
    }

    /// Create a validation error with specific code and field
    pub fn validation_with_code(
        code: u16,
        message: impl Into<String>,
        field: Option<String>,
    ) -> Self {
        Self::Validation {
            code,
            message: message.into(),
            field,
            source: None,
        }
    }

    /// Create a generic other error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            code: ErrorCode::OTHER_GENERIC,
            message: message.into(),
            source: None,
        }
    }

    /// Add a source error to this error
    pub fn with_source(mut self, source: impl Into<BoxedSource>) -> Self {
        match &mut self {
            Self::Config { source: src, .. }
            | Self::Connection { source: src, .. }
            | Self::Session { source: src, .. }
            | Self::Command { source: src, .. }
            | Self::Workflow { source: src, .. }
            | Self::Validation { source: src, .. }
            | Self::Other { source: src, .. } => {
                *src = Some(source.into());
            }
        }
        self
    }

    /// Add context to the error message
    pub fn with_context(mut self, context: impl Display) -> Self {
        match &mut self {
            Self::Config { message, .. }
            | Self::Connection { message, .. }
            | Self::Session { message, .. }
            | Self::Command { message, .. }
            | Self::Workflow { message, .. }
            | Self::Validation { message, .. }
            | Self::Other { message, .. } => {
                *message = format!("{}: {}", message, context);
            }
        }
        self
    }

    /// Attach the configuration file path to a configuration error
    pub fn with_path(mut self, config_path: impl Into<PathBuf>) -> Self {
        if let Self::Config { path, .. } = &mut self {
            *path = Some(config_path.into());
        }
        self
    }

    /// Attach the remote host to a connection or session error
    pub fn with_host(mut self, remote: impl Into<String>) -> Self {
        if let Self::Connection { host, .. } | Self::Session { host, .. } = &mut self {
            *host = Some(remote.into());
        }
        self
    }

    /// Set the remote exit code for a command error
    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        if let Self::Command {
            exit_code: ref mut ec,
            ..
        } = self
        {
            *ec = Some(exit_code);
        }
        self
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,
            Self::Connection { .. } => 3,
            Self::Session { .. } => 4,
            Self::Command { .. } => 5,
            Self::Workflow { .. } => 6,
            Self::Validation { .. } => 8,
            Self::Other { .. } => 1,
        }
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Config { code, .. }
            | Self::Connection { code, .. }
            | Self::Session { code, .. }
            | Self::Command { code, .. }
            | Self::Workflow { code, .. }
            | Self::Validation { code, .. }
            | Self::Other { code, .. } => *code,
        }
    }

    /// The refresh step this error is attributed to, if any
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::Command { step, .. } => step.as_deref(),
            _ => None,
        }
    }

    /// Whether the error was caused by the remote transport rather than a command
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Session { .. })
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Config { message, path, .. } => match path {
                Some(p) => format!("Configuration problem in {}: {}", p.display(), message),
                None => format!("Configuration problem: {}", message),
            },
            Self::Connection { message, host, .. } => match host {
                Some(h) => format!("Cannot connect to {}: {}", h, message),
                None => format!("Connection error: {}", message),
            },
            Self::Session { message, host, .. } => match host {
                Some(h) => format!("Session to {} failed: {}", h, message),
                None => format!("Session error: {}", message),
            },
            Self::Command {
                message,
                step,
                exit_code,
                ..
            } => {
                let mut msg = String::from("Refresh aborted");
                if let Some(s) = step {
                    msg.push_str(&format!(" at step '{}'", s));
                }
                if let Some(code) = exit_code {
                    msg.push_str(&format!(" (exit code {})", code));
                }
                format!("{}: {}", msg, message)
            }
            Self::Workflow { message, .. } => format!("Refresh workflow error: {}", message),
            Self::Validation { message, field, .. } => match field {
                Some(f) => format!("Validation error for '{}': {}", f, message),
                None => format!("Validation error: {}", message),
            },
            Self::Other { message, .. } => message.clone(),
        }
    }

    /// Get a developer-friendly error message with full chain
    pub fn developer_message(&self) -> String {
        let mut out = format!("{}", self);
        let mut source = StdError::source(self);
        while let Some(cause) = source {
            out.push_str(&format!("\n  caused by: {}", cause));
            source = StdError::source(cause);
        }
        out
    }
}

/// Type alias for Results using RefreshError
pub type Result<T> = std::result::Result<T, RefreshError>;

impl From<std::io::Error> for RefreshError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let (code, message) = match err.kind() {
            ErrorKind::NotFound => (ErrorCode::CONFIG_NOT_FOUND, "File not found"),
            ErrorKind::PermissionDenied => (ErrorCode::CONFIG_PATH_ERROR, "Permission denied"),
            _ => (ErrorCode::CONFIG_GENERIC, "I/O operation failed"),
        };

        RefreshError::config_with_code(code, message).with_source(err)
    }
}

impl From<toml::de::Error> for RefreshError {
    fn from(err: toml::de::Error) -> Self {
        RefreshError::config_with_code(ErrorCode::CONFIG_INVALID_TOML, "Invalid TOML syntax")
            .with_source(err)
    }
}

impl From<serde_json::Error> for RefreshError {
    fn from(err: serde_json::Error) -> Self {
        RefreshError::config_with_code(ErrorCode::CONFIG_INVALID_JSON, "Invalid JSON syntax")
            .with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation_and_chaining() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "config.toml");
        let err = RefreshError::config("Cannot read configuration")
            .with_source(io_err)
            .with_context("while loading endpoints");

        assert_eq!(err.code(), ErrorCode::CONFIG_GENERIC);
        assert!(err.to_string().contains("[E1000]"));
        assert!(err.user_message().contains("while loading endpoints"));
        assert!(err.developer_message().contains("caused by: config.toml"));
    }

    #[test]
    fn test_command_error_carries_step_and_exit_code() {
        let err = RefreshError::command(
            ErrorCode::COMMAND_PURGE_FAILED,
            "ORA-01031: insufficient privileges",
            "purge schema RPT",
        )
        .with_exit_code(1);

        assert_eq!(err.step(), Some("purge schema RPT"));
        assert_eq!(err.exit_code(), 5);
        let message = err.user_message();
        assert!(message.contains("purge schema RPT"));
        assert!(message.contains("ORA-01031"));
        assert!(message.contains("exit code 1"));
    }

    #[test]
    fn test_transport_errors() {
        let conn = RefreshError::connection(
            ErrorCode::CONNECTION_UNREACHABLE,
            "no route to host",
            Some("prod-db".to_string()),
        );
        assert!(conn.is_transport());
        assert_eq!(conn.exit_code(), 3);
        assert!(conn.user_message().starts_with("Cannot connect to prod-db"));

        let cmd = RefreshError::command(ErrorCode::COMMAND_GENERIC, "boom", "export");
        assert!(!cmd.is_transport());
    }

    #[test]
    fn test_io_error_conversion() {
        let err: RefreshError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert_eq!(err.code(), ErrorCode::CONFIG_NOT_FOUND);
        assert_eq!(err.exit_code(), 2);
    }
}
