//! Fan-out of payment events to registered sinks.
//!
//! Sinks are registered once at startup with a [`SinkDescriptor`] naming the
//! event kinds they observe, their execution mode, priority and timeout. The
//! [`DispatchEngine`] indexes them by event kind and, for each event, runs
//! them in ascending priority:
//!
//! ```text
//!   WebhookEvent ──▶ DispatchEngine ──┬─ sync  ─▶ spawn + timeout, awaited
//!                                     └─ async ─▶ WorkerPool::try_submit
//! ```
//!
//! Every invocation is its own task raced against the sink's timeout, so a
//! failing, panicking or stalled sink never affects its siblings or the
//! caller.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod descriptor;
pub mod engine;
pub mod error;
pub mod registry;
pub mod sinks;

pub use descriptor::{ExecutionMode, SinkDescriptor};
pub use engine::{DispatchEngine, DispatchReport, SinkOutcome, SinkReport};
pub use error::DispatchError;
pub use registry::{SinkBinding, SinkIndex, SinkRegistry};
pub use sinks::{
    default_sinks, AuditEntry, AuditSink, AuditTrail, BuiltinSinks, EventCounters, FraudAlertSink,
    MetricsSink,
};
