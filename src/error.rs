//! Error types for the arbiter.
//!
//! Only configuration problems are hard failures. Per-request conditions
//! (unknown roles, non-converging negotiation) are absorbed into a valid
//! `Resolution`, so `Arbiter::resolve` itself never returns an error.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating arbiter configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration defines no roles")]
    NoRoles,

    #[error("Role id cannot be empty")]
    EmptyRoleId,

    #[error("Role '{id}' is defined more than once")]
    DuplicateRole {
        id: String,
    },

    #[error("Role '{id}' has base priority {value}, expected a value in [0, 10]")]
    PriorityOutOfRange {
        id: String,
        value: i64,
    },

    #[error("Role '{id}' is referenced by {context} but is not defined")]
    UndefinedRole {
        id: String,
        context: String,
    },

    #[error("Threshold '{name}' has invalid value {value}: {reason}")]
    InvalidThreshold {
        name: String,
        value: f64,
        reason: String,
    },

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        pattern: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {message}")]
    Parse {
        message: String,
    },

    #[error("Failed to read configuration file {path}: {message}")]
    Io {
        path: PathBuf,
        message: String,
    },
}

/// Errors from the concurrent resolution runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Resolution queue is full (capacity {capacity})")]
    QueueFull {
        capacity: usize,
    },

    #[error("Resolution workers are disconnected")]
    Disconnected,

    #[error("Timed out waiting {duration_ms}ms for a resolution")]
    Timeout {
        duration_ms: u64,
    },

    #[error("Failed to spawn resolution worker: {message}")]
    Spawn {
        message: String,
    },
}

/// Top-level error type for the arbiter.
#[derive(Debug, Error)]
pub enum ArbiterError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Invalid request: {message}")]
    InvalidRequest {
        message: String,
    },
}

impl ArbiterError {
    /// Creates an invalid-request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this is a runtime error.
    #[must_use]
    pub const fn is_runtime(&self) -> bool {
        matches!(self, Self::Runtime(_))
    }

    /// Returns true if this is an invalid-request error.
    #[must_use]
    pub const fn is_invalid_request(&self) -> bool {
        matches!(self, Self::InvalidRequest { .. })
    }

    /// Returns true if retrying the same call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Config(_) | Self::InvalidRequest { .. } => false,
            Self::Runtime(e) => matches!(e, RuntimeError::QueueFull { .. } | RuntimeError::Timeout { .. }),
        }
    }
}

/// Result type alias for arbiter operations.
pub type ArbiterResult<T> = Result<T, ArbiterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_out_of_range_message() {
        let err = ConfigError::PriorityOutOfRange {
            id: "security".to_string(),
            value: 11,
        };
        let msg = format!("{err}");
        assert!(msg.contains("security"));
        assert!(msg.contains("11"));
        assert!(msg.contains("[0, 10]"));
    }

    #[test]
    fn test_undefined_role_message() {
        let err = ConfigError::UndefinedRole {
            id: "ghost".to_string(),
            context: "oppositions".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("ghost"));
        assert!(msg.contains("oppositions"));
    }

    #[test]
    fn test_arbiter_error_from_config() {
        let err: ArbiterError = ConfigError::NoRoles.into();
        assert!(err.is_config());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_arbiter_error_from_runtime() {
        let err: ArbiterError = RuntimeError::QueueFull { capacity: 4 }.into();
        assert!(err.is_runtime());
        assert!(err.is_retryable());

        let err: ArbiterError = RuntimeError::Disconnected.into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_invalid_request() {
        let err = ArbiterError::invalid_request("missing field `command`");
        assert!(err.is_invalid_request());
        assert!(format!("{err}").contains("missing field"));
    }
}
