//! Errors raised while assembling the sink index.
//!
//! Dispatching itself never fails; these only surface at startup.

use thiserror::Error;

/// Sink registration errors.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A descriptor carries unusable metadata.
    #[error("invalid descriptor for sink '{sink}': {reason}")]
    InvalidDescriptor {
        /// Sink name.
        sink: String,
        /// What is wrong.
        reason: String,
    },

    /// Two sinks were registered under the same name.
    #[error("sink '{0}' registered more than once")]
    DuplicateSink(String),
}

impl DispatchError {
    /// Creates an invalid descriptor error.
    pub fn invalid(sink: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDescriptor { sink: sink.into(), reason: reason.into() }
    }
}
