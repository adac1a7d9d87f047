//! Built-in sinks.
//!
//! | sink          | events                       | mode | priority | timeout |
//! |---------------|------------------------------|------|----------|---------|
//! | `audit`       | approved, declined, refunded | sync | 1        | 30 s    |
//! | `fraud-alert` | declined                     | sync | 10       | 15 s    |
//! | `metrics`     | approved, declined           | sync | 50       | 5 s     |

use std::sync::Arc;

use paysink_core::{Clock, EventSink, RegistryBuilder};

use crate::{descriptor::SinkDescriptor, registry::SinkRegistry};

mod audit;
mod fraud_alert;
mod metrics;

pub use audit::{AuditEntry, AuditSink, AuditTrail};
pub use fraud_alert::{FraudAlertSink, ALERT_LATENCY};
pub use metrics::{EventCounters, MetricsSink};

/// Handles to the built-in sinks so their state can be inspected.
#[derive(Debug, Clone)]
pub struct BuiltinSinks {
    /// Audit logger.
    pub audit: Arc<AuditSink>,
    /// Fraud team notifier.
    pub fraud_alert: Arc<FraudAlertSink>,
    /// Event counter.
    pub metrics: Arc<MetricsSink>,
}

impl BuiltinSinks {
    /// Creates fresh built-in sinks.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            audit: Arc::new(AuditSink::new(AuditTrail::new())),
            fraud_alert: Arc::new(FraudAlertSink::new(clock)),
            metrics: Arc::new(MetricsSink::new(EventCounters::new())),
        }
    }

    /// Adds the built-in sinks to `builder`.
    pub fn register(
        &self,
        builder: RegistryBuilder<dyn EventSink, SinkDescriptor>,
    ) -> RegistryBuilder<dyn EventSink, SinkDescriptor> {
        builder
            .register(Arc::clone(&self.audit) as Arc<dyn EventSink>, AuditSink::descriptor())
            .register(
                Arc::clone(&self.fraud_alert) as Arc<dyn EventSink>,
                FraudAlertSink::descriptor(),
            )
            .register(Arc::clone(&self.metrics) as Arc<dyn EventSink>, MetricsSink::descriptor())
    }
}

/// Builds a registry holding only the built-in sinks.
pub fn default_sinks(sinks: &BuiltinSinks) -> SinkRegistry {
    sinks.register(SinkRegistry::builder()).build()
}
