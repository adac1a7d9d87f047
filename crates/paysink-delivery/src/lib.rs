//! Reliable outbound webhook delivery.
//!
//! When a payment changes state, the merchant's webhook URL receives a signed
//! JSON body. Every webhook is persisted as a
//! [`DeliveryRecord`](paysink_core::DeliveryRecord) before the first attempt
//! and updated after each one, so the attempt history survives failures and
//! pending records can be resumed.
//!
//! - [`payload`]: the `payment.updated` wire format
//! - [`signing`]: base64 HMAC-SHA256 signatures and constant-time checks
//! - [`client`]: the HTTP POST and status classification
//! - [`retry`]: retry policy and state machine
//! - [`engine`]: record creation and the pool-driven retry chain

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod engine;
pub mod error;
pub mod payload;
pub mod retry;
pub mod signing;

pub use client::{ClientConfig, DeliveryClient, DeliveryRequest, DeliveryResponse};
pub use engine::{DeliveryConfig, DeliveryEngine, DeliveryStats};
pub use error::{DeliveryError, ErrorCategory, Result};
pub use payload::{PaymentData, WebhookPayload, PAYMENT_UPDATED};
pub use retry::{BackoffStrategy, RetryPolicy, RetryState};
pub use signing::{sign_payload, verify_signature, SigningError};
