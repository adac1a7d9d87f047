//! Payment events and the sink contract.
//!
//! Every payment status transition produces an [`EventKind`]. The dispatch
//! layer wraps it in a fresh [`WebhookEvent`] and hands a copy to every sink
//! bound to that kind.
//!
//! ```text
//!  status transition ──▶ EventKind ──▶ WebhookEvent ──▶ EventSink::handle
//!                                         (by value, one copy per sink)
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::SinkError,
    models::{EventId, MerchantId, Payment, PaymentId, PaymentStatus},
};

/// Kinds of payment lifecycle events observable by sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// Payment accepted in `PENDING`.
    PaymentCreated,
    /// Payment approved.
    PaymentApproved,
    /// Payment declined.
    PaymentDeclined,
    /// Payment refunded.
    PaymentRefunded,
    /// Payment expired.
    PaymentExpired,
}

impl EventKind {
    /// Number of event kinds.
    pub const COUNT: usize = 5;

    /// All kinds in declaration order.
    pub const ALL: [EventKind; Self::COUNT] = [
        Self::PaymentCreated,
        Self::PaymentApproved,
        Self::PaymentDeclined,
        Self::PaymentRefunded,
        Self::PaymentExpired,
    ];

    /// Wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentCreated => "PAYMENT_CREATED",
            Self::PaymentApproved => "PAYMENT_APPROVED",
            Self::PaymentDeclined => "PAYMENT_DECLINED",
            Self::PaymentRefunded => "PAYMENT_REFUNDED",
            Self::PaymentExpired => "PAYMENT_EXPIRED",
        }
    }

    /// Stable position of this kind inside [`EventKind::ALL`].
    pub fn index(&self) -> usize {
        match self {
            Self::PaymentCreated => 0,
            Self::PaymentApproved => 1,
            Self::PaymentDeclined => 2,
            Self::PaymentRefunded => 3,
            Self::PaymentExpired => 4,
        }
    }
}

impl From<PaymentStatus> for EventKind {
    fn from(status: PaymentStatus) -> Self {
        match status {
            PaymentStatus::Pending => Self::PaymentCreated,
            PaymentStatus::Approved => Self::PaymentApproved,
            PaymentStatus::Declined => Self::PaymentDeclined,
            PaymentStatus::Refunded => Self::PaymentRefunded,
            PaymentStatus::Expired => Self::PaymentExpired,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event handed to sinks for one payment transition.
///
/// Created fresh per dispatch and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Unique ID of this event.
    pub event_id: EventId,

    /// Kind derived from the payment status.
    pub event_kind: EventKind,

    /// Payment that transitioned.
    pub payment_id: PaymentId,

    /// Status the payment transitioned into.
    pub payment_status: PaymentStatus,

    /// Merchant owning the payment.
    pub merchant_id: MerchantId,

    /// When the event was produced.
    pub occurred_at: DateTime<Utc>,
}

impl WebhookEvent {
    /// Builds the event for the payment's current status.
    pub fn from_payment(payment: &Payment, occurred_at: DateTime<Utc>) -> Self {
        Self {
            event_id: EventId::new(),
            event_kind: payment.event_kind(),
            payment_id: payment.id,
            payment_status: payment.status,
            merchant_id: payment.merchant_id,
            occurred_at,
        }
    }
}

/// Observer of payment events.
///
/// Implementations must be safe to call from several tasks at once. A sink
/// reports failures through `SinkError`; the dispatcher isolates them from
/// other sinks and from the caller, and it also contains panics.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync + fmt::Debug {
    /// Handles one event.
    async fn handle(&self, event: WebhookEvent) -> Result<(), SinkError>;
}
