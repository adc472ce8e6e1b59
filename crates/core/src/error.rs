//! Core error types for the ferry simulation.
//!
//! The steady-state boarding protocol has no runtime error kind. Errors only
//! arise while bringing the simulation up, tearing it down, or reading
//! configuration and recorded event logs.

use std::path::PathBuf;

use thiserror::Error;

/// Core error type for ferry operations.
#[derive(Debug, Error)]
pub enum Error {
    // Lifecycle errors
    #[error("failed to initialize {resource}: {reason}")]
    InitializationFailed { resource: String, reason: String },

    #[error("failed to tear down {resource}: {reason}")]
    TeardownFailed { resource: String, reason: String },

    // Configuration errors
    #[error("invalid configuration for '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("failed to read config file '{path}': {reason}")]
    ConfigReadFailed { path: PathBuf, reason: String },

    // Event log errors
    #[error("invalid event log entry at line {line}: {reason}")]
    EventLogInvalid { line: usize, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an initialization error.
    pub fn initialization_failed(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InitializationFailed {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Create a teardown error.
    pub fn teardown_failed(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TeardownFailed {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration validation error.
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a config file read error.
    pub fn config_read_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ConfigReadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an event log parse error.
    pub fn event_log_invalid(line: usize, reason: impl Into<String>) -> Self {
        Self::EventLogInvalid {
            line,
            reason: reason.into(),
        }
    }

    /// Whether this error must abort the process.
    ///
    /// Teardown failures happen while the process is exiting anyway and are
    /// only ever logged.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::TeardownFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialization_failed_display() {
        let err = Error::initialization_failed("vehicle thread 3", "resource exhausted");
        assert_eq!(
            err.to_string(),
            "failed to initialize vehicle thread 3: resource exhausted"
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn test_teardown_failed_is_not_fatal() {
        let err = Error::teardown_failed("ferry thread", "did not join");
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_invalid_config_display() {
        let err = Error::invalid_config("capacity", "must be greater than 0");
        assert_eq!(
            err.to_string(),
            "invalid configuration for 'capacity': must be greater than 0"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
