//! Error types shared across the workspace.
//!
//! `CoreError` covers repository and validation failures. `SinkError` is the
//! failure type returned by event sinks; the dispatch engine logs it and
//! never lets it reach the caller.

use thiserror::Error;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for storage and validation operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Entity not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Constraint violation.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CoreError {
    /// Creates a not-found error for the named entity.
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{entity} {id}"))
    }

    /// Creates a constraint violation error.
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::ConstraintViolation(message.into())
    }
}

/// Failure reported by an event sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink could not process the event.
    #[error("sink '{sink}' failed: {message}")]
    Failed {
        /// Name of the failing sink.
        sink: String,
        /// Description of the failure.
        message: String,
    },

    /// The sink depends on something that is currently unavailable.
    #[error("sink '{sink}' unavailable: {message}")]
    Unavailable {
        /// Name of the failing sink.
        sink: String,
        /// Description of the failure.
        message: String,
    },
}

impl SinkError {
    /// Creates a processing failure.
    pub fn failed(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed { sink: sink.into(), message: message.into() }
    }

    /// Creates an unavailability failure.
    pub fn unavailable(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable { sink: sink.into(), message: message.into() }
    }
}

impl From<CoreError> for SinkError {
    fn from(err: CoreError) -> Self {
        Self::unavailable("storage", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_format_messages() {
        let err = CoreError::not_found("payment", "pay_1");
        assert_eq!(err.to_string(), "Not found: payment pay_1");

        let err = SinkError::failed("audit", "disk full");
        assert_eq!(err.to_string(), "sink 'audit' failed: disk full");
    }
}
