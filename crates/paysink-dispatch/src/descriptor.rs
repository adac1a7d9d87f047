//! Static metadata attached to each sink.

use std::{collections::BTreeSet, time::Duration};

use paysink_core::{Descriptor, EventKind};
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

/// Where a sink runs relative to the dispatching task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Awaited on the dispatching task.
    Sync,
    /// Queued on the worker pool.
    #[default]
    Async,
}

/// Registration metadata of a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkDescriptor {
    /// Unique sink name.
    pub name: String,

    /// Event kinds the sink observes.
    pub events: BTreeSet<EventKind>,

    /// Execution mode.
    pub mode: ExecutionMode,

    /// Deadline for a single invocation. Must be positive.
    pub timeout: Duration,

    /// Lower runs earlier.
    pub priority: i32,

    /// Disabled sinks stay registered but receive nothing.
    pub enabled: bool,
}

impl SinkDescriptor {
    /// Default invocation deadline.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Default priority.
    pub const DEFAULT_PRIORITY: i32 = 100;

    /// Creates an async descriptor with default timeout and priority.
    pub fn new(name: impl Into<String>, events: impl IntoIterator<Item = EventKind>) -> Self {
        Self {
            name: name.into(),
            events: events.into_iter().collect(),
            mode: ExecutionMode::default(),
            timeout: Self::DEFAULT_TIMEOUT,
            priority: Self::DEFAULT_PRIORITY,
            enabled: true,
        }
    }

    /// Runs the sink on the dispatching task.
    #[must_use]
    pub fn sync(mut self) -> Self {
        self.mode = ExecutionMode::Sync;
        self
    }

    /// Sets the execution mode.
    #[must_use]
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the invocation deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Marks the sink disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Checks the metadata is usable.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::InvalidDescriptor` for an empty name, an empty
    /// event set or a zero timeout.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.name.trim().is_empty() {
            return Err(DispatchError::invalid(&self.name, "name must not be empty"));
        }
        if self.events.is_empty() {
            return Err(DispatchError::invalid(&self.name, "must observe at least one event"));
        }
        if self.timeout.is_zero() {
            return Err(DispatchError::invalid(&self.name, "timeout must be positive"));
        }
        Ok(())
    }
}

impl Descriptor for SinkDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn order(&self) -> i32 {
        self.priority
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let descriptor = SinkDescriptor::new("ledger", [EventKind::PaymentApproved]);

        assert_eq!(descriptor.mode, ExecutionMode::Async);
        assert_eq!(descriptor.timeout, Duration::from_secs(30));
        assert_eq!(descriptor.priority, 100);
        assert!(descriptor.enabled);
        assert!(descriptor.validate().is_ok());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let descriptor =
            SinkDescriptor::new("ledger", [EventKind::PaymentApproved]).with_timeout(Duration::ZERO);

        assert!(matches!(descriptor.validate(), Err(DispatchError::InvalidDescriptor { .. })));
    }

    #[test]
    fn empty_event_set_is_rejected() {
        let descriptor = SinkDescriptor::new("ledger", []);
        assert!(descriptor.validate().is_err());
    }

    #[test]
    fn duplicate_event_kinds_collapse() {
        let descriptor = SinkDescriptor::new(
            "ledger",
            [EventKind::PaymentApproved, EventKind::PaymentApproved, EventKind::PaymentRefunded],
        );
        assert_eq!(descriptor.events.len(), 2);
    }
}
