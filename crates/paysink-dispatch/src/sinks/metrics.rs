use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use paysink_core::{EventKind, EventSink, SinkError, WebhookEvent};
use tracing::debug;

use crate::descriptor::SinkDescriptor;

/// Process-wide event counters, one per event kind.
///
/// Starts at zero; clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct EventCounters {
    counts: Arc<[AtomicU64; EventKind::COUNT]>,
}

impl EventCounters {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one to `kind` and returns the new value.
    pub fn increment(&self, kind: EventKind) -> u64 {
        self.counts[kind.index()].fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Current value for `kind`.
    pub fn get(&self, kind: EventKind) -> u64 {
        self.counts[kind.index()].load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every non-zero counter.
    pub fn snapshot(&self) -> BTreeMap<EventKind, u64> {
        EventKind::ALL
            .iter()
            .map(|&kind| (kind, self.get(kind)))
            .filter(|&(_, count)| count > 0)
            .collect()
    }

    /// Sum of all counters.
    pub fn total(&self) -> u64 {
        EventKind::ALL.iter().map(|&kind| self.get(kind)).sum()
    }
}

/// Counts approvals and declines.
#[derive(Debug, Clone, Default)]
pub struct MetricsSink {
    counters: EventCounters,
}

impl MetricsSink {
    /// Registered sink name.
    pub const NAME: &'static str = "metrics";

    /// Creates the sink incrementing `counters`.
    pub fn new(counters: EventCounters) -> Self {
        Self { counters }
    }

    /// The counters updated by this sink.
    pub fn counters(&self) -> &EventCounters {
        &self.counters
    }

    /// Registration metadata: sync, priority 50, 5 s timeout.
    pub fn descriptor() -> SinkDescriptor {
        SinkDescriptor::new(Self::NAME, [EventKind::PaymentApproved, EventKind::PaymentDeclined])
            .sync()
            .with_priority(50)
            .with_timeout(Duration::from_secs(5))
    }
}

#[async_trait]
impl EventSink for MetricsSink {
    async fn handle(&self, event: WebhookEvent) -> Result<(), SinkError> {
        let count = self.counters.increment(event.event_kind);
        debug!(event_kind = %event.event_kind, count, "event counted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_empty_and_share_state() {
        let counters = EventCounters::new();
        let shared = counters.clone();

        assert!(counters.snapshot().is_empty());

        shared.increment(EventKind::PaymentApproved);
        shared.increment(EventKind::PaymentApproved);
        counters.increment(EventKind::PaymentDeclined);

        assert_eq!(counters.get(EventKind::PaymentApproved), 2);
        assert_eq!(counters.total(), 3);
        assert_eq!(
            counters.snapshot(),
            BTreeMap::from([(EventKind::PaymentApproved, 2), (EventKind::PaymentDeclined, 1)])
        );
    }
}
