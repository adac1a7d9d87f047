use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use paysink_core::{
    EventId, EventKind, EventSink, MerchantId, PaymentId, PaymentStatus, SinkError, WebhookEvent,
};
use tracing::info;

use crate::descriptor::SinkDescriptor;

/// One audited status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    /// Event that carried the change.
    pub event_id: EventId,
    /// Payment that changed.
    pub payment_id: PaymentId,
    /// Owning merchant.
    pub merchant_id: MerchantId,
    /// New status.
    pub status: PaymentStatus,
    /// When the change happened.
    pub occurred_at: DateTime<Utc>,
}

/// Append-only in-process audit trail. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct AuditTrail {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl AuditTrail {
    /// Creates an empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries in append order.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().map(|entries| entries.clone()).unwrap_or_default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or_default()
    }

    /// Whether the trail is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Logs every approval, decline and refund before any other sink runs.
#[derive(Debug, Clone, Default)]
pub struct AuditSink {
    trail: AuditTrail,
}

impl AuditSink {
    /// Registered sink name.
    pub const NAME: &'static str = "audit";

    /// Creates the sink appending to `trail`.
    pub fn new(trail: AuditTrail) -> Self {
        Self { trail }
    }

    /// The trail written by this sink.
    pub fn trail(&self) -> &AuditTrail {
        &self.trail
    }

    /// Registration metadata: sync, priority 1, default timeout.
    pub fn descriptor() -> SinkDescriptor {
        SinkDescriptor::new(
            Self::NAME,
            [EventKind::PaymentApproved, EventKind::PaymentDeclined, EventKind::PaymentRefunded],
        )
        .sync()
        .with_priority(1)
    }
}

#[async_trait]
impl EventSink for AuditSink {
    async fn handle(&self, event: WebhookEvent) -> Result<(), SinkError> {
        info!(
            target: "paysink::audit",
            payment_id = %event.payment_id,
            merchant_id = %event.merchant_id,
            status = %event.payment_status,
            "payment status changed"
        );

        let entry = AuditEntry {
            event_id: event.event_id,
            payment_id: event.payment_id,
            merchant_id: event.merchant_id,
            status: event.payment_status,
            occurred_at: event.occurred_at,
        };

        self.trail
            .entries
            .lock()
            .map_err(|_| SinkError::unavailable(Self::NAME, "audit trail lock poisoned"))?
            .push(entry);

        Ok(())
    }
}
