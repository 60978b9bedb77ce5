//! Error types for MiniLangFlow.
//!
//! Library crates use [`FlowError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all MiniLangFlow operations.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// A required request field is missing or blank.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The remote model call failed (transport, status, or payload).
    #[error("gateway error: {0}")]
    Gateway(String),

    /// The external retrieval process failed or produced unusable output.
    #[error("retrieval error: {0}")]
    Retrieval(String),

    /// The HTTP listener could not be bound or stopped unexpectedly.
    #[error("server error: {0}")]
    Server(String),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FlowError>;

impl FlowError {
    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error was caused by the caller's input rather than the system.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = FlowError::validation("field 'text' is required");
        assert_eq!(err.to_string(), "validation error: field 'text' is required");

        let err = FlowError::Retrieval("bad".into());
        assert_eq!(err.to_string(), "retrieval error: bad");
    }

    #[test]
    fn only_validation_is_a_caller_error() {
        assert!(FlowError::validation("blank").is_validation());
        assert!(!FlowError::Gateway("503".into()).is_validation());
        assert!(!FlowError::Retrieval("exit 1".into()).is_validation());
        assert!(!FlowError::config("x").is_validation());
    }
}
