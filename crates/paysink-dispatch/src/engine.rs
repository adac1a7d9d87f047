//! The dispatch engine.

use std::{fmt, sync::Arc, time::Duration};

use paysink_core::{
    worker_pool::panic_message, EventId, EventKind, EventSink, WebhookEvent, WorkerPool,
};
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{
    descriptor::{ExecutionMode, SinkDescriptor},
    error::DispatchError,
    registry::{SinkIndex, SinkRegistry},
};

/// Result of one sink invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOutcome {
    /// The sink returned `Ok`.
    Completed,
    /// The sink returned an error.
    Failed(String),
    /// The deadline expired first; the task was aborted.
    TimedOut,
    /// The sink panicked.
    Panicked(String),
}

impl SinkOutcome {
    /// Whether the sink completed successfully.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for SinkOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Failed(message) => write!(f, "failed: {message}"),
            Self::TimedOut => f.write_str("timed out"),
            Self::Panicked(message) => write!(f, "panicked: {message}"),
        }
    }
}

/// Outcome of a synchronously executed sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkReport {
    /// Sink name.
    pub sink: String,

    /// What happened.
    pub outcome: SinkOutcome,

    /// Time spent waiting for the sink.
    pub elapsed: Duration,
}

/// What a single `dispatch` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Dispatched event.
    pub event_id: EventId,

    /// Its kind.
    pub event_kind: EventKind,

    /// Sync sinks in execution order.
    pub sync_outcomes: Vec<SinkReport>,

    /// Async sinks handed to the worker pool, in submission order.
    pub queued: Vec<String>,

    /// Async sinks the worker pool refused.
    pub rejected: Vec<String>,
}

impl DispatchReport {
    fn new(event: &WebhookEvent) -> Self {
        Self {
            event_id: event.event_id,
            event_kind: event.event_kind,
            sync_outcomes: Vec::new(),
            queued: Vec::new(),
            rejected: Vec::new(),
        }
    }

    /// Whether no sink was bound to the event.
    pub fn is_empty(&self) -> bool {
        self.sync_outcomes.is_empty() && self.queued.is_empty() && self.rejected.is_empty()
    }

    /// Outcome of the named sync sink.
    pub fn outcome_of(&self, sink: &str) -> Option<&SinkOutcome> {
        self.sync_outcomes.iter().find(|report| report.sink == sink).map(|report| &report.outcome)
    }

    /// Names of sync sinks in the order they ran.
    pub fn sync_order(&self) -> Vec<&str> {
        self.sync_outcomes.iter().map(|report| report.sink.as_str()).collect()
    }
}

/// Fans events out to the sinks bound to their kind.
#[derive(Debug)]
pub struct DispatchEngine {
    index: SinkIndex,
    pool: Arc<WorkerPool>,
}

impl DispatchEngine {
    /// Indexes `registry` and uses `pool` for async sinks.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError` if the registry holds invalid or duplicate
    /// descriptors.
    pub fn new(registry: &SinkRegistry, pool: Arc<WorkerPool>) -> Result<Self, DispatchError> {
        Ok(Self { index: SinkIndex::build(registry)?, pool })
    }

    /// The binding index.
    pub fn index(&self) -> &SinkIndex {
        &self.index
    }

    /// Delivers `event` to every enabled sink bound to its kind.
    ///
    /// Sinks run in ascending priority. Sync sinks are awaited here, each
    /// bounded by its timeout; async sinks are queued on the worker pool.
    /// Failures, panics and timeouts are logged per sink and never returned.
    pub async fn dispatch(&self, event: WebhookEvent) -> DispatchReport {
        let span = info_span!(
            "dispatch",
            event_id = %event.event_id,
            event_kind = %event.event_kind,
            payment_id = %event.payment_id,
        );
        self.dispatch_inner(event).instrument(span).await
    }

    async fn dispatch_inner(&self, event: WebhookEvent) -> DispatchReport {
        let mut report = DispatchReport::new(&event);
        let bindings = self.index.bindings_for(event.event_kind);

        if bindings.is_empty() {
            debug!("no sinks bound to event kind");
            return report;
        }

        info!(sinks = bindings.len(), "dispatching event");

        for binding in bindings {
            let sink = Arc::clone(&binding.sink);
            let descriptor = Arc::clone(&binding.descriptor);

            match descriptor.mode {
                ExecutionMode::Sync => {
                    let started = Instant::now();
                    let outcome = invoke(sink, &descriptor, event.clone()).await;
                    report.sync_outcomes.push(SinkReport {
                        sink: descriptor.name.clone(),
                        outcome,
                        elapsed: started.elapsed(),
                    });
                },
                ExecutionMode::Async => {
                    let name = descriptor.name.clone();
                    let job_event = event.clone();
                    let job_span = info_span!("async_sink", sink = %name);
                    let job = async move {
                        invoke(sink, &descriptor, job_event).await;
                    }
                    .instrument(job_span);

                    match self.pool.try_submit(job) {
                        Ok(()) => report.queued.push(name),
                        Err(err) => {
                            warn!(sink = %name, error = %err, "async sink not scheduled");
                            report.rejected.push(name);
                        },
                    }
                },
            }
        }

        report
    }
}

/// Runs one sink as its own task raced against the descriptor's timeout.
async fn invoke(
    sink: Arc<dyn EventSink>,
    descriptor: &SinkDescriptor,
    event: WebhookEvent,
) -> SinkOutcome {
    let mut handle = tokio::spawn(async move { sink.handle(event).await });

    let outcome = match tokio::time::timeout(descriptor.timeout, &mut handle).await {
        Ok(Ok(Ok(()))) => SinkOutcome::Completed,
        Ok(Ok(Err(err))) => SinkOutcome::Failed(err.to_string()),
        Ok(Err(join_error)) if join_error.is_panic() => {
            SinkOutcome::Panicked(panic_message(join_error.into_panic().as_ref()))
        },
        Ok(Err(join_error)) => SinkOutcome::Failed(join_error.to_string()),
        Err(_elapsed) => {
            // Best effort: the sink stops at its next await point.
            handle.abort();
            SinkOutcome::TimedOut
        },
    };

    match &outcome {
        SinkOutcome::Completed => debug!(sink = %descriptor.name, "sink completed"),
        SinkOutcome::Failed(message) => {
            error!(sink = %descriptor.name, error = %message, "sink failed");
        },
        SinkOutcome::TimedOut => warn!(
            sink = %descriptor.name,
            timeout_ms = descriptor.timeout.as_millis() as u64,
            "sink timed out"
        ),
        SinkOutcome::Panicked(message) => {
            error!(sink = %descriptor.name, panic = %message, "sink panicked");
        },
    }

    outcome
}

#[cfg(test)]
mod tests {
    use paysink_core::{PoolConfig, RealClock};
    use paysink_testing::{FailingSink, RecordingSink, SinkJournal};

    use super::*;
    use crate::descriptor::SinkDescriptor;

    fn pool() -> Arc<WorkerPool> {
        WorkerPool::start(PoolConfig::new("sinks", 2, 8), Arc::new(RealClock::new()))
            .expect("valid pool config")
    }

    fn event(kind: EventKind) -> WebhookEvent {
        WebhookEvent {
            event_id: EventId::new(),
            event_kind: kind,
            payment_id: paysink_core::PaymentId::new(),
            payment_status: paysink_core::PaymentStatus::Approved,
            merchant_id: paysink_core::MerchantId::new(),
            occurred_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn unbound_event_is_a_no_op() {
        let registry = SinkRegistry::builder().build();
        let engine = DispatchEngine::new(&registry, pool()).expect("valid");

        let report = engine.dispatch(event(EventKind::PaymentExpired)).await;

        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn failed_sink_is_reported_not_raised() {
        let journal = SinkJournal::new();
        let registry = SinkRegistry::builder()
            .register(
                Arc::new(FailingSink::new("broken", journal.clone())) as Arc<dyn EventSink>,
                SinkDescriptor::new("broken", [EventKind::PaymentApproved]).sync().with_priority(1),
            )
            .register(
                Arc::new(RecordingSink::new("next", journal.clone())) as Arc<dyn EventSink>,
                SinkDescriptor::new("next", [EventKind::PaymentApproved]).sync().with_priority(2),
            )
            .build();
        let engine = DispatchEngine::new(&registry, pool()).expect("valid");

        let report = engine.dispatch(event(EventKind::PaymentApproved)).await;

        assert!(matches!(report.outcome_of("broken"), Some(SinkOutcome::Failed(_))));
        assert_eq!(report.outcome_of("next"), Some(&SinkOutcome::Completed));
        assert_eq!(journal.names(), vec!["broken", "next"]);
    }
}
