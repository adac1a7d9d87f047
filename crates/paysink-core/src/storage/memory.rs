//! In-memory repository implementations.
//!
//! Each store keeps its rows in an `Arc<RwLock<HashMap>>`, so clones share
//! state. Writes take the single write lock, which serializes updates to any
//! given delivery record.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{DeliveryRepository, MerchantRepository, PaymentRepository};
use crate::{
    error::{CoreError, Result},
    models::{DeliveryId, DeliveryRecord, Merchant, MerchantId, Payment, PaymentId},
};

/// In-memory payment store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentRepository {
    payments: Arc<RwLock<HashMap<PaymentId, Payment>>>,
}

impl InMemoryPaymentRepository {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored payments.
    pub async fn len(&self) -> usize {
        self.payments.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.payments.read().await.is_empty()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn find_by_id(&self, id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.payments.read().await.get(&id).cloned())
    }

    async fn save(&self, payment: &Payment) -> Result<()> {
        self.payments.write().await.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn count_by_merchant_created_after(
        &self,
        merchant_id: MerchantId,
        after: DateTime<Utc>,
    ) -> Result<u64> {
        let payments = self.payments.read().await;
        let count = payments
            .values()
            .filter(|payment| payment.merchant_id == merchant_id && payment.created_at > after)
            .count();
        Ok(count as u64)
    }

    async fn find_by_idempotency_key(
        &self,
        merchant_id: MerchantId,
        key: &str,
    ) -> Result<Option<Payment>> {
        let payments = self.payments.read().await;
        Ok(payments
            .values()
            .find(|payment| {
                payment.merchant_id == merchant_id
                    && payment.idempotency_key.as_deref() == Some(key)
            })
            .cloned())
    }
}

/// In-memory merchant store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMerchantRepository {
    merchants: Arc<RwLock<HashMap<MerchantId, Merchant>>>,
}

impl InMemoryMerchantRepository {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MerchantRepository for InMemoryMerchantRepository {
    async fn find_by_id(&self, id: MerchantId) -> Result<Option<Merchant>> {
        Ok(self.merchants.read().await.get(&id).cloned())
    }

    async fn save(&self, merchant: &Merchant) -> Result<()> {
        self.merchants.write().await.insert(merchant.id, merchant.clone());
        Ok(())
    }
}

/// In-memory delivery record store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDeliveryRepository {
    records: Arc<RwLock<HashMap<DeliveryId, DeliveryRecord>>>,
}

impl InMemoryDeliveryRepository {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored record.
    pub async fn all(&self) -> Vec<DeliveryRecord> {
        let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
        records.sort_by_key(|record| record.created_at);
        records
    }
}

#[async_trait]
impl DeliveryRepository for InMemoryDeliveryRepository {
    async fn find_by_id(&self, id: DeliveryId) -> Result<Option<DeliveryRecord>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn save(&self, record: &DeliveryRecord) -> Result<()> {
        let mut records = self.records.write().await;

        if let Some(existing) = records.get(&record.id) {
            if record.attempts < existing.attempts {
                return Err(CoreError::constraint(format!(
                    "delivery {} attempts would regress from {} to {}",
                    record.id, existing.attempts, record.attempts
                )));
            }
            if existing.delivered && !record.delivered {
                return Err(CoreError::constraint(format!(
                    "delivery {} is already delivered",
                    record.id
                )));
            }
        }

        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn find_undelivered(&self, max_attempts: u32) -> Result<Vec<DeliveryRecord>> {
        let records = self.records.read().await;
        let mut pending: Vec<_> = records
            .values()
            .filter(|record| !record.is_terminal(max_attempts))
            .cloned()
            .collect();
        pending.sort_by_key(|record| record.created_at);
        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::{
        events::EventKind,
        models::{EventId, PaymentStatus},
    };

    fn payment(merchant_id: MerchantId, created_at: DateTime<Utc>) -> Payment {
        Payment {
            id: PaymentId::new(),
            merchant_id,
            method: "CARD".to_string(),
            amount: dec!(100.00),
            currency: "BRL".to_string(),
            installments: 1,
            status: PaymentStatus::Pending,
            created_at,
            updated_at: created_at,
            idempotency_key: None,
            metadata_order_id: None,
        }
    }

    fn record() -> DeliveryRecord {
        DeliveryRecord {
            id: DeliveryId::new(),
            event_id: EventId::new(),
            event_kind: EventKind::PaymentApproved,
            event_type: "payment.updated".to_string(),
            payment_id: PaymentId::new(),
            target_url: "http://localhost/hook".to_string(),
            signature: String::new(),
            payload: "{}".to_string(),
            attempts: 0,
            delivered: false,
            last_attempt_at: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn counts_only_recent_payments_of_merchant() {
        let repo = InMemoryPaymentRepository::new();
        let merchant = MerchantId::new();
        let now = Utc::now();

        repo.save(&payment(merchant, now - Duration::minutes(1))).await.unwrap();
        repo.save(&payment(merchant, now - Duration::minutes(2))).await.unwrap();
        repo.save(&payment(merchant, now - Duration::minutes(10))).await.unwrap();
        repo.save(&payment(MerchantId::new(), now)).await.unwrap();

        let count = repo
            .count_by_merchant_created_after(merchant, now - Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn idempotency_key_is_scoped_to_merchant() {
        let repo = InMemoryPaymentRepository::new();
        let merchant = MerchantId::new();
        let mut keyed = payment(merchant, Utc::now());
        keyed.idempotency_key = Some("order-42".to_string());
        repo.save(&keyed).await.unwrap();

        let found = repo.find_by_idempotency_key(merchant, "order-42").await.unwrap();
        assert_eq!(found.map(|p| p.id), Some(keyed.id));

        let other = repo.find_by_idempotency_key(MerchantId::new(), "order-42").await.unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn delivery_save_rejects_attempt_regression() {
        let repo = InMemoryDeliveryRepository::new();
        let mut record = record();
        record.attempts = 2;
        repo.save(&record).await.unwrap();

        let mut stale = record.clone();
        stale.attempts = 1;
        let err = repo.save(&stale).await.unwrap_err();
        assert!(matches!(err, CoreError::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn delivery_save_rejects_undelivering() {
        let repo = InMemoryDeliveryRepository::new();
        let mut record = record();
        record.record_attempt(true, Utc::now());
        repo.save(&record).await.unwrap();

        let mut stale = record.clone();
        stale.delivered = false;
        assert!(repo.save(&stale).await.is_err());
    }

    #[tokio::test]
    async fn undelivered_excludes_terminal_records() {
        let repo = InMemoryDeliveryRepository::new();

        let open = record();
        let mut delivered = record();
        delivered.record_attempt(true, Utc::now());
        let mut exhausted = record();
        for _ in 0..5 {
            exhausted.record_attempt(false, Utc::now());
        }

        for r in [&open, &delivered, &exhausted] {
            repo.save(r).await.unwrap();
        }

        let pending = repo.find_undelivered(5).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, open.id);
    }
}
