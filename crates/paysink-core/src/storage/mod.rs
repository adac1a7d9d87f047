//! Repository contracts for payments, merchants and delivery records.
//!
//! Persistence is an external collaborator: the workflow, fraud rules and
//! delivery engine only see these traits. [`memory`] provides in-memory
//! implementations used by the binary and by tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::Result,
    models::{DeliveryId, DeliveryRecord, Merchant, MerchantId, Payment, PaymentId},
};

pub mod memory;

pub use memory::{InMemoryDeliveryRepository, InMemoryMerchantRepository, InMemoryPaymentRepository};

/// Payment persistence.
#[async_trait]
pub trait PaymentRepository: Send + Sync + std::fmt::Debug {
    /// Loads a payment by id.
    async fn find_by_id(&self, id: PaymentId) -> Result<Option<Payment>>;

    /// Inserts or replaces a payment.
    async fn save(&self, payment: &Payment) -> Result<()>;

    /// Counts the merchant's payments created strictly after `after`.
    async fn count_by_merchant_created_after(
        &self,
        merchant_id: MerchantId,
        after: DateTime<Utc>,
    ) -> Result<u64>;

    /// Finds the merchant's payment carrying the given idempotency key.
    async fn find_by_idempotency_key(
        &self,
        merchant_id: MerchantId,
        key: &str,
    ) -> Result<Option<Payment>>;
}

/// Merchant persistence.
#[async_trait]
pub trait MerchantRepository: Send + Sync + std::fmt::Debug {
    /// Loads a merchant by id.
    async fn find_by_id(&self, id: MerchantId) -> Result<Option<Merchant>>;

    /// Inserts or replaces a merchant.
    async fn save(&self, merchant: &Merchant) -> Result<()>;
}

/// Delivery record persistence.
#[async_trait]
pub trait DeliveryRepository: Send + Sync + std::fmt::Debug {
    /// Loads a delivery record by id.
    async fn find_by_id(&self, id: DeliveryId) -> Result<Option<DeliveryRecord>>;

    /// Inserts or replaces a delivery record.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::ConstraintViolation` if the save would decrease
    /// `attempts` or clear `delivered`.
    async fn save(&self, record: &DeliveryRecord) -> Result<()>;

    /// Records that are neither delivered nor out of attempts, oldest first.
    async fn find_undelivered(&self, max_attempts: u32) -> Result<Vec<DeliveryRecord>>;
}
