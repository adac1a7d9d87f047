//! Integration tests for the delivery engine against a local webhook target.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::{sync::Arc, time::Duration};

use paysink_core::{
    Clock, DeliveryId, DeliveryRecord, DeliveryRepository, EventId, EventKind,
    InMemoryDeliveryRepository, InMemoryMerchantRepository, Merchant, MerchantRepository,
    Payment, PaymentStatus, PoolConfig, TestClock, WorkerPool,
};
use paysink_delivery::{
    verify_signature, DeliveryConfig, DeliveryEngine, DeliveryError, RetryState, PAYMENT_UPDATED,
};
use paysink_testing::{MerchantBuilder, PaymentBuilder, WebhookTarget};

const SECRET: &str = "whsec_test";

struct Harness {
    engine: DeliveryEngine,
    deliveries: InMemoryDeliveryRepository,
    merchants: InMemoryMerchantRepository,
    clock: TestClock,
    pool: Arc<WorkerPool>,
}

impl Harness {
    fn new() -> Self {
        let clock = TestClock::new();
        let deliveries = InMemoryDeliveryRepository::new();
        let merchants = InMemoryMerchantRepository::new();
        let pool = WorkerPool::start(PoolConfig::new("webhooks", 2, 16), Arc::new(clock.clone()))
            .expect("valid pool config");

        let engine = DeliveryEngine::new(
            DeliveryConfig::new(SECRET),
            Arc::new(merchants.clone()),
            Arc::new(deliveries.clone()),
            Arc::clone(&pool),
            Arc::new(clock.clone()),
        )
        .expect("valid engine config");

        Self { engine, deliveries, merchants, clock, pool }
    }

    async fn merchant(&self, webhook_url: Option<&str>) -> Merchant {
        let mut builder = MerchantBuilder::new();
        if let Some(url) = webhook_url {
            builder = builder.webhook_url(url);
        }
        let merchant = builder.build();
        self.merchants.save(&merchant).await.unwrap();
        merchant
    }

    async fn approved_payment(&self, webhook_url: &str) -> Payment {
        let merchant = self.merchant(Some(webhook_url)).await;
        PaymentBuilder::new(merchant.id).status(PaymentStatus::Approved).build()
    }

    async fn record(&self, id: DeliveryId) -> DeliveryRecord {
        self.deliveries.find_by_id(id).await.unwrap().expect("record persisted")
    }

    async fn wait_until_terminal(&self, id: DeliveryId) -> DeliveryRecord {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let record = self.record(id).await;
                if record.is_terminal(5) {
                    return record;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("delivery reached a terminal state")
    }
}

/// A record that was persisted but never handed to the pool.
async fn create_without_sending(harness: &Harness, url: &str) -> DeliveryId {
    let payment = harness.approved_payment(url).await;
    let record = DeliveryRecord {
        id: DeliveryId::new(),
        event_id: EventId::new(),
        event_kind: EventKind::PaymentApproved,
        event_type: PAYMENT_UPDATED.to_string(),
        payment_id: payment.id,
        target_url: url.to_string(),
        signature: paysink_delivery::sign_payload(b"{}", SECRET).unwrap(),
        payload: "{}".to_string(),
        attempts: 0,
        delivered: false,
        last_attempt_at: None,
        created_at: harness.clock.now_utc(),
    };
    harness.deliveries.save(&record).await.unwrap();
    record.id
}

#[tokio::test]
async fn failing_endpoint_is_retried_five_times_with_linear_backoff() {
    let target = WebhookTarget::start().await;
    target.always(500).await;
    let harness = Harness::new();
    let id = create_without_sending(&harness, &target.url()).await;

    let state = harness.engine.deliver_now(id).await.unwrap();

    assert_eq!(state, RetryState::Exhausted { attempts: 5 });
    assert_eq!(target.request_count().await, 5);
    assert_eq!(harness.clock.sleeps(), [1, 2, 3, 4].map(Duration::from_secs));

    let record = harness.record(id).await;
    assert_eq!(record.attempts, 5);
    assert!(!record.delivered);
    assert!(record.last_attempt_at.is_some());

    let stats = harness.engine.stats();
    assert_eq!((stats.attempts, stats.failed, stats.exhausted), (5, 5, 1));
}

#[tokio::test]
async fn fifth_attempt_success_marks_record_delivered() {
    let target = WebhookTarget::start().await;
    target.respond_with_sequence(&[500, 500, 500, 500, 200]).await;
    let harness = Harness::new();
    let id = create_without_sending(&harness, &target.url()).await;

    let state = harness.engine.deliver_now(id).await.unwrap();

    assert_eq!(state, RetryState::Succeeded { attempts: 5 });
    let record = harness.record(id).await;
    assert_eq!(record.attempts, 5);
    assert!(record.delivered);
    assert_eq!(target.request_count().await, 5);
}

#[tokio::test]
async fn transport_failures_count_as_attempts() {
    let harness = Harness::new();
    let id = create_without_sending(&harness, "http://127.0.0.1:1/webhooks").await;

    let state = harness.engine.deliver_now(id).await.unwrap();

    assert_eq!(state, RetryState::Exhausted { attempts: 5 });
    assert_eq!(harness.record(id).await.attempts, 5);
}

#[tokio::test]
async fn terminal_records_are_not_sent_again() {
    let target = WebhookTarget::start().await;
    target.always(200).await;
    let harness = Harness::new();
    let id = create_without_sending(&harness, &target.url()).await;

    assert_eq!(harness.engine.try_deliver(id).await.unwrap(), RetryState::Succeeded { attempts: 1 });
    assert_eq!(harness.engine.try_deliver(id).await.unwrap(), RetryState::Succeeded { attempts: 1 });
    assert_eq!(target.request_count().await, 1);
}

#[tokio::test]
async fn missing_record_stops_the_chain() {
    let harness = Harness::new();

    let result = harness.engine.try_deliver(DeliveryId::new()).await;

    assert!(matches!(result, Err(DeliveryError::RecordMissing { .. })));
}

#[tokio::test]
async fn merchant_without_webhook_url_is_skipped() {
    let harness = Harness::new();
    for url in [None, Some("   ")] {
        let merchant = harness.merchant(url).await;
        let payment = PaymentBuilder::new(merchant.id).status(PaymentStatus::Approved).build();

        assert_eq!(harness.engine.send_webhook(&payment).await, None);
    }
    assert!(harness.deliveries.all().await.is_empty());
}

#[tokio::test]
async fn webhook_is_signed_and_carries_event_headers() {
    let target = WebhookTarget::start().await;
    target.always(200).await;
    let harness = Harness::new();
    let payment = harness.approved_payment(&target.url()).await;

    let id = harness.engine.send_webhook(&payment).await.expect("record created");
    let record = harness.wait_until_terminal(id).await;

    assert!(record.delivered);
    assert_eq!(record.attempts, 1);

    let received = target.received().await;
    assert_eq!(received.len(), 1);
    let webhook = &received[0];

    assert_eq!(webhook.header("content-type"), Some("application/json"));
    assert_eq!(webhook.header("x-event-type"), Some("payment.updated"));
    let signature = webhook.header("x-signature").expect("signature header");
    assert_eq!(signature, record.signature);
    assert_eq!(verify_signature(webhook.body.as_bytes(), signature, SECRET), Ok(()));

    let body = webhook.json().expect("json body");
    assert_eq!(body["id"], record.event_id.to_string());
    assert_eq!(body["type"], "payment.updated");
    assert_eq!(body["data"]["paymentId"], payment.id.to_string());
    assert_eq!(body["data"]["status"], "APPROVED");

    harness.pool.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn pool_driven_retries_resubmit_after_backoff() {
    let target = WebhookTarget::start().await;
    target.respond_with_sequence(&[503, 200]).await;
    let harness = Harness::new();
    let payment = harness.approved_payment(&target.url()).await;

    let id = harness.engine.send_webhook(&payment).await.expect("record created");
    let record = harness.wait_until_terminal(id).await;

    assert!(record.delivered);
    assert_eq!(record.attempts, 2);
    assert_eq!(harness.clock.sleeps(), vec![Duration::from_secs(1)]);
    assert_eq!(harness.engine.stats().succeeded, 1);

    harness.pool.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn pool_driven_chain_exhausts_after_five_attempts() {
    let target = WebhookTarget::start().await;
    target.always(500).await;
    let harness = Harness::new();
    let payment = harness.approved_payment(&target.url()).await;

    let id = harness.engine.send_webhook(&payment).await.expect("record created");
    let record = harness.wait_until_terminal(id).await;

    assert!(!record.delivered);
    assert_eq!(record.attempts, 5);
    assert_eq!(harness.clock.sleeps(), [1, 2, 3, 4].map(Duration::from_secs));
    assert_eq!(target.request_count().await, 5);

    harness.pool.shutdown(Duration::from_secs(1)).await.unwrap();
    assert_eq!(harness.engine.stats().exhausted, 1);
}

#[tokio::test]
async fn pending_records_are_resumed() {
    let target = WebhookTarget::start().await;
    target.always(200).await;
    let harness = Harness::new();
    let pending = create_without_sending(&harness, &target.url()).await;

    let resumed = harness.engine.resume_pending().await.unwrap();
    let record = harness.wait_until_terminal(pending).await;

    assert_eq!(resumed, 1);
    assert!(record.delivered);
    assert_eq!(harness.engine.resume_pending().await.unwrap(), 0);

    harness.pool.shutdown(Duration::from_secs(1)).await.unwrap();
}
