//! Wire format of outbound webhooks.

use chrono::{DateTime, Utc};
use paysink_core::{EventId, Payment, PaymentStatus};
use serde::{Deserialize, Serialize};

use crate::error::{DeliveryError, Result};

/// Event type sent for every payment status change.
pub const PAYMENT_UPDATED: &str = "payment.updated";

/// Body POSTed to merchant endpoints.
///
/// ```json
/// {"id":"evt_…","type":"payment.updated","data":{"paymentId":"pay_…","status":"APPROVED","occurredAt":"…"}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Event identifier, `evt_` prefixed.
    pub id: String,

    /// Event type, always [`PAYMENT_UPDATED`].
    #[serde(rename = "type")]
    pub event_type: String,

    /// Payment snapshot.
    pub data: PaymentData,
}

/// Payment fields carried by a webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentData {
    /// Payment identifier, `pay_` prefixed.
    pub payment_id: String,

    /// Status after the change.
    pub status: PaymentStatus,

    /// When the payload was built.
    pub occurred_at: DateTime<Utc>,
}

impl WebhookPayload {
    /// Builds the payload for `payment`'s current status.
    pub fn for_payment(event_id: EventId, payment: &Payment, occurred_at: DateTime<Utc>) -> Self {
        Self {
            id: event_id.to_string(),
            event_type: PAYMENT_UPDATED.to_string(),
            data: PaymentData {
                payment_id: payment.id.to_string(),
                status: payment.status,
                occurred_at,
            },
        }
    }

    /// Compact JSON encoding. This exact string is signed and sent.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Serialization` if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| DeliveryError::Serialization { message: e.to_string() })
    }
}
