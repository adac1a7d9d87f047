//! Event sinks with scripted behavior.
//!
//! Every sink appends to a [`SinkJournal`] when invoked, so tests can assert
//! on invocation order across several sinks sharing one journal.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use paysink_core::{EventSink, SinkError, WebhookEvent};

/// Ordered log of `(sink name, event)` invocations shared between sinks.
#[derive(Debug, Clone, Default)]
pub struct SinkJournal {
    entries: Arc<Mutex<Vec<(String, WebhookEvent)>>>,
}

impl SinkJournal {
    /// Creates an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, sink: &str, event: &WebhookEvent) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((sink.to_string(), event.clone()));
        }
    }

    /// Sink names in invocation order.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .lock()
            .map(|entries| entries.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default()
    }

    /// Events seen by the named sink.
    pub fn events_for(&self, sink: &str) -> Vec<WebhookEvent> {
        self.entries
            .lock()
            .map(|entries| {
                entries.iter().filter(|(name, _)| name == sink).map(|(_, e)| e.clone()).collect()
            })
            .unwrap_or_default()
    }

    /// Number of invocations of the named sink.
    pub fn count(&self, sink: &str) -> usize {
        self.events_for(sink).len()
    }

    /// Total number of invocations.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or_default()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Records every event and succeeds.
#[derive(Debug, Clone)]
pub struct RecordingSink {
    name: String,
    journal: SinkJournal,
}

impl RecordingSink {
    /// Creates a sink writing to `journal`.
    pub fn new(name: impl Into<String>, journal: SinkJournal) -> Self {
        Self { name: name.into(), journal }
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn handle(&self, event: WebhookEvent) -> Result<(), SinkError> {
        self.journal.record(&self.name, &event);
        Ok(())
    }
}

/// Records the event, then reports a failure.
#[derive(Debug, Clone)]
pub struct FailingSink {
    name: String,
    journal: SinkJournal,
}

impl FailingSink {
    /// Creates a sink writing to `journal`.
    pub fn new(name: impl Into<String>, journal: SinkJournal) -> Self {
        Self { name: name.into(), journal }
    }
}

#[async_trait]
impl EventSink for FailingSink {
    async fn handle(&self, event: WebhookEvent) -> Result<(), SinkError> {
        self.journal.record(&self.name, &event);
        Err(SinkError::failed(&self.name, "scripted failure"))
    }
}

/// Records the event, then panics.
#[derive(Debug, Clone)]
pub struct PanickingSink {
    name: String,
    journal: SinkJournal,
}

impl PanickingSink {
    /// Creates a sink writing to `journal`.
    pub fn new(name: impl Into<String>, journal: SinkJournal) -> Self {
        Self { name: name.into(), journal }
    }
}

#[async_trait]
impl EventSink for PanickingSink {
    async fn handle(&self, event: WebhookEvent) -> Result<(), SinkError> {
        self.journal.record(&self.name, &event);
        panic!("sink '{}' panicked on purpose", self.name)
    }
}

/// Records the event, then sleeps on the tokio timer before succeeding.
///
/// Pair with `#[tokio::test(start_paused = true)]` to exercise timeouts
/// without real waiting.
#[derive(Debug, Clone)]
pub struct SlowSink {
    name: String,
    journal: SinkJournal,
    delay: Duration,
}

impl SlowSink {
    /// Creates a sink that takes `delay` per event.
    pub fn new(name: impl Into<String>, journal: SinkJournal, delay: Duration) -> Self {
        Self { name: name.into(), journal, delay }
    }
}

#[async_trait]
impl EventSink for SlowSink {
    async fn handle(&self, event: WebhookEvent) -> Result<(), SinkError> {
        self.journal.record(&self.name, &event);
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}
