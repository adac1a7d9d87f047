//! Error types for webhook delivery operations.
//!
//! Every failed HTTP exchange counts as a failed attempt and is retried under
//! the retry policy; the categories below exist for logging and statistics.

use std::fmt;

use paysink_core::{CoreError, DeliveryId};
use thiserror::Error;

use crate::signing::SigningError;

/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Failures raised while preparing or attempting a webhook delivery.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// Network-level connectivity failure.
    #[error("network connection failed: {message}")]
    Network {
        /// Error message describing the network failure
        message: String,
    },

    /// HTTP request timeout exceeded.
    #[error("request timeout after {timeout_seconds}s")]
    Timeout {
        /// Number of seconds before the request timed out
        timeout_seconds: u64,
    },

    /// HTTP response indicated client error (4xx).
    #[error("client error: HTTP {status_code}")]
    ClientError {
        /// HTTP status code (4xx)
        status_code: u16,
        /// Response body content
        body: String,
    },

    /// HTTP response indicated server error (5xx).
    #[error("server error: HTTP {status_code}")]
    ServerError {
        /// HTTP status code (5xx)
        status_code: u16,
        /// Response body content
        body: String,
    },

    /// Response outside the 2xx, 4xx and 5xx ranges.
    #[error("unexpected response: HTTP {status_code}")]
    UnexpectedStatus {
        /// HTTP status code
        status_code: u16,
    },

    /// The delivery record no longer exists.
    #[error("delivery record {id} not found")]
    RecordMissing {
        /// Identifier that was looked up
        id: DeliveryId,
    },

    /// Reading or writing a record failed.
    #[error("storage error: {message}")]
    Storage {
        /// Storage error message
        message: String,
    },

    /// The payload could not be serialized.
    #[error("payload serialization failed: {message}")]
    Serialization {
        /// Serializer error message
        message: String,
    },

    /// The payload could not be signed.
    #[error("signing failed: {0}")]
    Signing(#[from] SigningError),

    /// Invalid client or engine configuration.
    #[error("invalid delivery configuration: {message}")]
    Configuration {
        /// Configuration error message
        message: String,
    },
}

impl DeliveryError {
    /// Creates a network error from a message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(timeout_seconds: u64) -> Self {
        Self::Timeout { timeout_seconds }
    }

    /// Maps a non-2xx status to the matching error.
    pub fn from_status(status_code: u16, body: impl Into<String>) -> Self {
        match status_code {
            400..=499 => Self::ClientError { status_code, body: body.into() },
            500..=599 => Self::ServerError { status_code, body: body.into() },
            _ => Self::UnexpectedStatus { status_code },
        }
    }

    /// Creates a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage { message: message.into() }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// HTTP status code carried by the error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ClientError { status_code, .. }
            | Self::ServerError { status_code, .. }
            | Self::UnexpectedStatus { status_code } => Some(*status_code),
            _ => None,
        }
    }
}

impl From<CoreError> for DeliveryError {
    fn from(error: CoreError) -> Self {
        Self::storage(error.to_string())
    }
}

/// Category of delivery error for logs and statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connectivity issues and timeouts.
    Network,
    /// HTTP client errors (4xx).
    Client,
    /// HTTP server errors (5xx) and unexpected statuses.
    Server,
    /// Record persistence.
    Storage,
    /// Payload serialization, signing and configuration.
    Internal,
}

impl From<&DeliveryError> for ErrorCategory {
    fn from(error: &DeliveryError) -> Self {
        match error {
            DeliveryError::Network { .. } | DeliveryError::Timeout { .. } => Self::Network,
            DeliveryError::ClientError { .. } => Self::Client,
            DeliveryError::ServerError { .. } | DeliveryError::UnexpectedStatus { .. } => {
                Self::Server
            },
            DeliveryError::RecordMissing { .. } | DeliveryError::Storage { .. } => Self::Storage,
            DeliveryError::Serialization { .. }
            | DeliveryError::Signing(_)
            | DeliveryError::Configuration { .. } => Self::Internal,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Client => write!(f, "client"),
            Self::Server => write!(f, "server"),
            Self::Storage => write!(f, "storage"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_to_error_kinds() {
        assert!(matches!(
            DeliveryError::from_status(404, "missing"),
            DeliveryError::ClientError { status_code: 404, .. }
        ));
        assert!(matches!(
            DeliveryError::from_status(503, ""),
            DeliveryError::ServerError { status_code: 503, .. }
        ));
        assert!(matches!(
            DeliveryError::from_status(302, ""),
            DeliveryError::UnexpectedStatus { status_code: 302 }
        ));
    }

    #[test]
    fn status_code_is_carried_by_http_errors_only() {
        assert_eq!(DeliveryError::from_status(429, "slow down").status_code(), Some(429));
        assert_eq!(DeliveryError::from_status(302, "").status_code(), Some(302));
        assert_eq!(DeliveryError::timeout(30).status_code(), None);
        assert_eq!(DeliveryError::from(SigningError::EmptySecret).status_code(), None);
    }

    #[test]
    fn error_categories_mapped_correctly() {
        assert_eq!(ErrorCategory::from(&DeliveryError::network("test")), ErrorCategory::Network);
        assert_eq!(
            ErrorCategory::from(&DeliveryError::from_status(400, "bad request")),
            ErrorCategory::Client
        );
        assert_eq!(
            ErrorCategory::from(&DeliveryError::from_status(500, "error")),
            ErrorCategory::Server
        );
        assert_eq!(ErrorCategory::from(&DeliveryError::storage("x")).to_string(), "storage");
    }

    #[test]
    fn core_errors_become_storage_errors() {
        let error: DeliveryError = CoreError::constraint("attempts regressed").into();
        assert!(matches!(error, DeliveryError::Storage { .. }));
        assert_eq!(error.status_code(), None);
    }
}
