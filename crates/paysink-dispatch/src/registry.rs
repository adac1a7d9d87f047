//! Sink registry and its per-event-kind index.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use paysink_core::{EventKind, EventSink, PluginRegistry};
use tracing::info;

use crate::{descriptor::SinkDescriptor, error::DispatchError};

/// Registry of event sinks ordered by priority.
pub type SinkRegistry = PluginRegistry<dyn EventSink, SinkDescriptor>;

/// A sink bound to one event kind.
#[derive(Debug, Clone)]
pub struct SinkBinding {
    /// The sink.
    pub sink: Arc<dyn EventSink>,

    /// Its metadata.
    pub descriptor: Arc<SinkDescriptor>,
}

/// Bindings grouped by event kind, each group in priority order.
///
/// Built once from a [`SinkRegistry`] and never re-sorted.
#[derive(Debug, Default)]
pub struct SinkIndex {
    by_kind: HashMap<EventKind, Vec<SinkBinding>>,
}

impl SinkIndex {
    /// Indexes the enabled sinks of `registry`.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError` when a descriptor is invalid or a name is
    /// registered twice.
    pub fn build(registry: &SinkRegistry) -> Result<Self, DispatchError> {
        let mut names = HashSet::new();
        for entry in registry.entries() {
            entry.descriptor.validate()?;
            if !names.insert(entry.descriptor.name.as_str()) {
                return Err(DispatchError::DuplicateSink(entry.descriptor.name.clone()));
            }
        }

        let mut by_kind: HashMap<EventKind, Vec<SinkBinding>> = HashMap::new();
        for entry in registry.all_enabled() {
            let descriptor = Arc::new(entry.descriptor.clone());
            for kind in &descriptor.events {
                by_kind.entry(*kind).or_default().push(SinkBinding {
                    sink: Arc::clone(&entry.plugin),
                    descriptor: Arc::clone(&descriptor),
                });

                info!(
                    sink = %descriptor.name,
                    event_kind = %kind,
                    mode = ?descriptor.mode,
                    priority = descriptor.priority,
                    timeout_ms = descriptor.timeout.as_millis() as u64,
                    "registered sink"
                );
            }
        }

        let total: usize = by_kind.values().map(Vec::len).sum();
        info!(bindings = total, event_kinds = by_kind.len(), "sink index built");

        Ok(Self { by_kind })
    }

    /// Bindings for `kind` in priority order.
    pub fn bindings_for(&self, kind: EventKind) -> &[SinkBinding] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// Total number of bindings across all kinds.
    pub fn binding_count(&self) -> usize {
        self.by_kind.values().map(Vec::len).sum()
    }
}
