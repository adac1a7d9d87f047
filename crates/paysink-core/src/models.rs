//! Core domain models and strongly-typed identifiers.
//!
//! Defines payments, merchants and webhook delivery records together with
//! newtype ID wrappers for compile-time type safety. Delivery records carry
//! the monotonic state transitions used by the retry driver.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::EventKind;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "_{}"), self.0.simple())
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_id!(
    /// Strongly-typed payment identifier.
    ///
    /// Displayed as `pay_<hex>` in logs and webhook payloads.
    PaymentId,
    "pay"
);

define_id!(
    /// Strongly-typed merchant identifier.
    MerchantId,
    "mer"
);

define_id!(
    /// Identifier of a single emitted event (sink fan-out or webhook).
    EventId,
    "evt"
);

define_id!(
    /// Identifier of a persisted webhook delivery record.
    DeliveryId,
    "dlv"
);

/// Lifecycle status of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Accepted, awaiting processing.
    Pending,
    /// Processed and approved.
    Approved,
    /// Declined by processing or by fraud screening.
    Declined,
    /// Refunded after approval.
    Refunded,
    /// Never completed within its validity window.
    Expired,
}

impl PaymentStatus {
    /// Wire name used in webhook payloads and audit logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Declined => "DECLINED",
            Self::Refunded => "REFUNDED",
            Self::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment owned by a merchant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier.
    pub id: PaymentId,

    /// Owning merchant.
    pub merchant_id: MerchantId,

    /// Payment method (e.g. `CARD`, `DEBIT`), upper-cased.
    pub method: String,

    /// Amount in the payment currency.
    pub amount: Decimal,

    /// ISO currency code.
    pub currency: String,

    /// Number of installments, 1 for single payments.
    pub installments: u32,

    /// Current lifecycle status.
    pub status: PaymentStatus,

    /// When the payment was accepted.
    pub created_at: DateTime<Utc>,

    /// Last status change.
    pub updated_at: DateTime<Utc>,

    /// Client supplied idempotency key, scoped to the merchant.
    pub idempotency_key: Option<String>,

    /// Merchant order reference carried in payment metadata.
    pub metadata_order_id: Option<String>,
}

impl Payment {
    /// Moves the payment to a new status, stamping `updated_at`.
    pub fn transition(&mut self, status: PaymentStatus, at: DateTime<Utc>) {
        self.status = status;
        self.updated_at = at;
    }

    /// Event kind derived from the current status.
    pub fn event_kind(&self) -> EventKind {
        EventKind::from(self.status)
    }
}

/// Merchant account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MerchantStatus {
    /// Allowed to transact.
    Active,
    /// Blocked from transacting.
    Blocked,
}

/// A merchant account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Merchant {
    /// Unique identifier.
    pub id: MerchantId,

    /// Display name.
    pub name: String,

    /// Webhook target URL. Delivery is opt-in: `None` or blank disables it.
    pub webhook_url: Option<String>,

    /// Account status.
    pub status: MerchantStatus,
}

impl Merchant {
    /// Returns the webhook target if one is configured and non-blank.
    pub fn webhook_target(&self) -> Option<&str> {
        self.webhook_url.as_deref().map(str::trim).filter(|url| !url.is_empty())
    }

    /// Whether the merchant may transact.
    pub fn is_active(&self) -> bool {
        self.status == MerchantStatus::Active
    }
}

/// Persisted state of one outbound webhook and its attempt history.
///
/// `attempts` only increases and `delivered` only moves from `false` to
/// `true`. Stores are expected to reject saves that regress either field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    /// Unique identifier.
    pub id: DeliveryId,

    /// Event carried by the payload.
    pub event_id: EventId,

    /// Event kind of the payment transition that produced this webhook.
    pub event_kind: EventKind,

    /// Wire event type sent in `X-Event-Type`.
    pub event_type: String,

    /// Payment the webhook refers to.
    pub payment_id: PaymentId,

    /// Destination URL.
    pub target_url: String,

    /// Base64 HMAC-SHA256 signature of `payload`.
    pub signature: String,

    /// Canonical JSON body.
    pub payload: String,

    /// Number of attempts made so far.
    pub attempts: u32,

    /// Whether a 2xx response was received.
    pub delivered: bool,

    /// Time of the most recent attempt.
    pub last_attempt_at: Option<DateTime<Utc>>,

    /// When the record was persisted.
    pub created_at: DateTime<Utc>,
}

impl DeliveryRecord {
    /// Records the outcome of one attempt.
    ///
    /// A success never gets undone by a later call; once delivered the flag
    /// stays set.
    pub fn record_attempt(&mut self, succeeded: bool, at: DateTime<Utc>) {
        self.attempts = self.attempts.saturating_add(1);
        self.last_attempt_at = Some(at);
        self.delivered = self.delivered || succeeded;
    }

    /// Whether no further attempts will be made under `max_attempts`.
    pub fn is_terminal(&self, max_attempts: u32) -> bool {
        self.delivered || self.attempts >= max_attempts
    }
}
