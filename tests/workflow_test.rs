//! End-to-end tests of the payment workflow over in-memory stores, a virtual
//! clock and a local webhook target.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::{future::Future, sync::Arc, time::Duration};

use paysink::{App, Config, CreatePayment, WorkflowError};
use paysink_core::{
    EventKind, EventSink, Merchant, MerchantId, MerchantRepository, Payment, PaymentId,
    PaymentStatus, TestClock,
};
use paysink_delivery::verify_signature;
use paysink_dispatch::SinkDescriptor;
use paysink_testing::{MerchantBuilder, RecordingSink, SinkJournal, WebhookTarget};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const SECRET: &str = "workflow-secret";

fn config(failure_rate: f64) -> Config {
    Config { webhook_secret: SECRET.to_string(), failure_rate, ..Config::default() }
}

fn app(failure_rate: f64) -> App {
    App::build(&config(failure_rate), Arc::new(TestClock::new())).expect("valid wiring")
}

async fn merchant(app: &App, builder: MerchantBuilder) -> Merchant {
    let merchant = builder.build();
    app.merchants.save(&merchant).await.unwrap();
    merchant
}

fn card(amount: Decimal) -> CreatePayment {
    CreatePayment {
        method: "card".to_string(),
        amount,
        currency: "brl".to_string(),
        installments: Some(1),
        idempotency_key: None,
        order_id: Some("ORDER-1".to_string()),
    }
}

async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let waited = tokio::time::timeout(Duration::from_secs(10), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

async fn status_of(app: &App, id: PaymentId) -> PaymentStatus {
    app.workflow.get_payment(id).await.unwrap().status
}

async fn delivered_count(app: &App) -> usize {
    app.deliveries.all().await.iter().filter(|record| record.delivered).count()
}

#[tokio::test]
async fn high_risk_payment_is_declined_without_entering_processing() {
    let target = WebhookTarget::start().await;
    target.always(200).await;
    let app = &app(0.0);
    let merchant = merchant(app, MerchantBuilder::new().webhook_url(target.url())).await;

    let payment = app.workflow.create_payment(merchant.id, card(dec!(25000.00))).await.unwrap();

    assert_eq!(payment.status, PaymentStatus::Declined);
    assert_eq!(status_of(app, payment.id).await, PaymentStatus::Declined);
    assert_eq!(app.processing_pool().stats().submitted, 0);

    assert_eq!(app.sinks.fraud_alert.alerts_sent(), 1);
    assert_eq!(app.sinks.metrics.counters().get(EventKind::PaymentDeclined), 1);
    let audit = app.sinks.audit.trail().entries();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].status, PaymentStatus::Declined);

    eventually("declined webhook", || async move { delivered_count(app).await == 1 }).await;
    let webhook = &target.received().await[0];
    assert_eq!(webhook.json().unwrap()["data"]["status"], "DECLINED");
}

#[tokio::test]
async fn approved_payment_notifies_sinks_then_merchant() {
    let target = WebhookTarget::start().await;
    target.always(200).await;
    let app = &app(0.0);
    let merchant = merchant(app, MerchantBuilder::new().webhook_url(target.url())).await;

    let payment = app.workflow.create_payment(merchant.id, card(dec!(100.00))).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.method, "CARD");
    assert_eq!(payment.currency, "BRL");

    let id = payment.id;
    eventually("approval", || async move { status_of(app, id).await == PaymentStatus::Approved })
        .await;
    eventually("approved webhook", || async move { delivered_count(app).await == 1 }).await;

    assert_eq!(app.sinks.fraud_alert.alerts_sent(), 0);
    assert_eq!(app.sinks.metrics.counters().get(EventKind::PaymentApproved), 1);
    assert_eq!(app.sinks.audit.trail().entries()[0].status, PaymentStatus::Approved);

    let received = target.received().await;
    assert_eq!(received.len(), 1);
    let webhook = &received[0];
    let signature = webhook.header("x-signature").expect("signed");
    assert_eq!(verify_signature(webhook.body.as_bytes(), signature, SECRET), Ok(()));
    assert_eq!(webhook.json().unwrap()["data"]["paymentId"], payment.id.to_string());

    app.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn processing_declines_at_full_failure_rate() {
    let app = &app(1.0);
    let merchant = merchant(app, MerchantBuilder::new()).await;

    let payment = app.workflow.create_payment(merchant.id, card(dec!(80.00))).await.unwrap();

    let id = payment.id;
    eventually("decline", || async move { status_of(app, id).await == PaymentStatus::Declined })
        .await;
    eventually("fraud alert", || async move { app.sinks.fraud_alert.alerts_sent() == 1 }).await;
    assert!(app.deliveries.all().await.is_empty());
}

#[tokio::test]
async fn idempotency_key_replays_the_original_payment() {
    let app = &app(0.0);
    let merchant = merchant(app, MerchantBuilder::new()).await;
    let request = CreatePayment { idempotency_key: Some("idem-1".to_string()), ..card(dec!(10)) };

    let first = app.workflow.create_payment(merchant.id, request.clone()).await.unwrap();
    let second = app.workflow.create_payment(merchant.id, request).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(app.payments.len().await, 1);
}

#[tokio::test]
async fn unknown_and_blocked_merchants_are_unauthorized() {
    let app = &app(0.0);
    let blocked = merchant(app, MerchantBuilder::new().blocked()).await;

    for merchant_id in [MerchantId::new(), blocked.id] {
        let result = app.workflow.create_payment(merchant_id, card(dec!(10))).await;
        assert!(matches!(result, Err(WorkflowError::Unauthorized)));
    }
}

#[tokio::test]
async fn malformed_requests_are_rejected_before_scoring() {
    let app = &app(0.0);
    let merchant = merchant(app, MerchantBuilder::new()).await;

    let requests = [
        CreatePayment { method: "PIX".to_string(), ..card(dec!(10)) },
        card(dec!(0)),
        CreatePayment { installments: Some(13), ..card(dec!(10)) },
        CreatePayment { method: "DEBIT".to_string(), installments: Some(3), ..card(dec!(10)) },
    ];
    for request in requests {
        let result = app.workflow.create_payment(merchant.id, request).await;
        assert!(matches!(result, Err(WorkflowError::InvalidRequest(_))), "got {result:?}");
    }
    assert!(app.payments.is_empty().await);
}

#[tokio::test]
async fn refunds_check_ownership_and_notify() {
    let app = &app(0.0);
    let owner = merchant(app, MerchantBuilder::new()).await;
    let stranger = merchant(app, MerchantBuilder::new()).await;
    let payment: Payment = app.workflow.create_payment(owner.id, card(dec!(50))).await.unwrap();
    let id = payment.id;
    eventually("approval", || async move { status_of(app, id).await == PaymentStatus::Approved })
        .await;

    let forbidden = app.workflow.refund(stranger.id, payment.id).await;
    assert!(matches!(forbidden, Err(WorkflowError::Forbidden(forbidden_id)) if forbidden_id == payment.id));

    let missing = app.workflow.refund(owner.id, PaymentId::new()).await;
    assert!(matches!(missing, Err(WorkflowError::NotFound(_))));

    let receipt = app.workflow.refund(owner.id, payment.id).await.unwrap();
    assert!(receipt.id.starts_with("ref_"));
    assert_eq!(status_of(app, payment.id).await, PaymentStatus::Refunded);
    assert!(app
        .sinks
        .audit
        .trail()
        .entries()
        .iter()
        .any(|entry| entry.status == PaymentStatus::Refunded));

    let again = app.workflow.refund(owner.id, payment.id).await;
    assert!(matches!(again, Err(WorkflowError::InvalidRequest(_))));
}

#[tokio::test]
async fn unreachable_webhook_target_never_fails_the_payment() {
    let app = &app(0.0);
    let merchant =
        merchant(app, MerchantBuilder::new().webhook_url("http://127.0.0.1:1/webhooks")).await;

    let payment = app.workflow.create_payment(merchant.id, card(dec!(30000))).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Declined);

    eventually("exhausted delivery", || async move { app.delivery.stats().exhausted == 1 }).await;
    let records = app.deliveries.all().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].attempts, 5);
    assert!(!records[0].delivered);
}

#[tokio::test]
async fn extra_sinks_observe_payment_creation() {
    let journal = SinkJournal::new();
    let probe: Arc<dyn EventSink> = Arc::new(RecordingSink::new("created-probe", journal.clone()));
    let app = &App::build_with_sinks(&config(0.0), Arc::new(TestClock::new()), |builder| {
        builder.register(
            probe,
            SinkDescriptor::new("created-probe", [EventKind::PaymentCreated]).sync(),
        )
    })
    .expect("valid wiring");
    let merchant = merchant(app, MerchantBuilder::new()).await;

    app.workflow.create_payment(merchant.id, card(dec!(10))).await.unwrap();

    assert_eq!(journal.count("created-probe"), 1);
    assert_eq!(journal.events_for("created-probe")[0].event_kind, EventKind::PaymentCreated);
}
