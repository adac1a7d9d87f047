//! Webhook delivery engine.
//!
//! ```text
//! send_webhook ──▶ DeliveryRepository::save ──▶ WorkerPool::try_submit(drive)
//!                                                         │
//!      ┌────────────── submit_after(delay, drive) ◀───────┤ Retrying
//!      ▼                                                  │
//!   drive ──▶ try_deliver ──▶ DeliveryClient ──▶ merchant endpoint
//! ```
//!
//! Each attempt reloads the record, POSTs the stored payload, persists the
//! incremented attempt count and asks the [`RetryPolicy`] what happens next.
//! Retries are delayed re-submissions to the webhook pool, so no worker is
//! held while waiting. Failures never escape to the caller of
//! [`DeliveryEngine::send_webhook`].

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use futures::future::{BoxFuture, FutureExt};
use paysink_core::{
    Clock, DeliveryId, DeliveryRecord, DeliveryRepository, EventId, MerchantRepository, Payment,
    WorkerPool,
};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{
    client::{ClientConfig, DeliveryClient, DeliveryRequest},
    error::{DeliveryError, ErrorCategory, Result},
    payload::WebhookPayload,
    retry::{RetryPolicy, RetryState},
    signing::sign_payload,
};

/// Configuration for the delivery engine.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Shared secret for `X-Signature`.
    pub signing_secret: String,

    /// HTTP client configuration.
    pub client: ClientConfig,

    /// Retry policy applied to every record.
    pub retry_policy: RetryPolicy,
}

impl DeliveryConfig {
    /// Default client and retry settings with the given secret.
    pub fn new(signing_secret: impl Into<String>) -> Self {
        Self {
            signing_secret: signing_secret.into(),
            client: ClientConfig::default(),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Replaces the client configuration.
    #[must_use]
    pub fn with_client(mut self, client: ClientConfig) -> Self {
        self.client = client;
        self
    }
}

/// Delivery counters since the engine was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Records created.
    pub scheduled: u64,
    /// HTTP attempts made.
    pub attempts: u64,
    /// Attempts answered with 2xx.
    pub succeeded: u64,
    /// Attempts that failed.
    pub failed: u64,
    /// Records that ran out of attempts.
    pub exhausted: u64,
}

#[derive(Debug, Default)]
struct Counters {
    scheduled: AtomicU64,
    attempts: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    exhausted: AtomicU64,
}

#[derive(Debug)]
struct Inner {
    merchants: Arc<dyn MerchantRepository>,
    deliveries: Arc<dyn DeliveryRepository>,
    client: DeliveryClient,
    pool: Arc<WorkerPool>,
    clock: Arc<dyn Clock>,
    config: DeliveryConfig,
    counters: Counters,
}

/// Creates, signs, persists and delivers outbound webhooks.
///
/// Cloning is cheap; clones share the same pool, stores and counters.
#[derive(Debug, Clone)]
pub struct DeliveryEngine {
    inner: Arc<Inner>,
}

impl DeliveryEngine {
    /// Creates an engine that runs deliveries on `pool`.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Configuration` for an empty signing secret, a
    /// zero attempt ceiling or an unusable HTTP client configuration.
    pub fn new(
        config: DeliveryConfig,
        merchants: Arc<dyn MerchantRepository>,
        deliveries: Arc<dyn DeliveryRepository>,
        pool: Arc<WorkerPool>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if config.signing_secret.is_empty() {
            return Err(DeliveryError::configuration("signing secret must not be empty"));
        }
        if config.retry_policy.max_attempts == 0 {
            return Err(DeliveryError::configuration("max_attempts must be at least 1"));
        }

        let client = DeliveryClient::new(config.client.clone(), Arc::clone(&clock))?;

        Ok(Self {
            inner: Arc::new(Inner {
                merchants,
                deliveries,
                client,
                pool,
                clock,
                config,
                counters: Counters::default(),
            }),
        })
    }

    /// Engine configuration.
    pub fn config(&self) -> &DeliveryConfig {
        &self.inner.config
    }

    /// Snapshot of the delivery counters.
    pub fn stats(&self) -> DeliveryStats {
        let c = &self.inner.counters;
        DeliveryStats {
            scheduled: c.scheduled.load(Ordering::Relaxed),
            attempts: c.attempts.load(Ordering::Relaxed),
            succeeded: c.succeeded.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            exhausted: c.exhausted.load(Ordering::Relaxed),
        }
    }

    /// Notifies the payment's merchant about its current status.
    ///
    /// Persists a signed record and hands its first attempt to the webhook
    /// pool, returning without waiting for it. Returns `None` when the
    /// merchant has no webhook URL or the record could not be created.
    pub async fn send_webhook(&self, payment: &Payment) -> Option<DeliveryId> {
        let record = match self.create_record(payment).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(payment_id = %payment.id, "merchant has no webhook url, skipping");
                return None;
            },
            Err(e) => {
                error!(
                    payment_id = %payment.id,
                    category = %ErrorCategory::from(&e),
                    error = %e,
                    "failed to create webhook delivery"
                );
                return None;
            },
        };

        self.schedule(record.id);
        Some(record.id)
    }

    /// Builds, signs and persists the record for `payment`.
    async fn create_record(&self, payment: &Payment) -> Result<Option<DeliveryRecord>> {
        let Some(merchant) = self.inner.merchants.find_by_id(payment.merchant_id).await? else {
            return Ok(None);
        };
        let Some(target_url) = merchant.webhook_target() else {
            return Ok(None);
        };

        let now = self.inner.clock.now_utc();
        let event_id = EventId::new();
        let payload = WebhookPayload::for_payment(event_id, payment, now);
        let body = payload.to_json()?;
        let signature = sign_payload(body.as_bytes(), &self.inner.config.signing_secret)?;

        let record = DeliveryRecord {
            id: DeliveryId::new(),
            event_id,
            event_kind: payment.event_kind(),
            event_type: payload.event_type,
            payment_id: payment.id,
            target_url: target_url.to_string(),
            signature,
            payload: body,
            attempts: 0,
            delivered: false,
            last_attempt_at: None,
            created_at: now,
        };

        self.inner.deliveries.save(&record).await?;
        self.inner.counters.scheduled.fetch_add(1, Ordering::Relaxed);

        info!(
            delivery_id = %record.id,
            payment_id = %record.payment_id,
            event_kind = %record.event_kind,
            url = %record.target_url,
            "webhook delivery scheduled"
        );

        Ok(Some(record))
    }

    /// Makes one attempt on a record and persists the result.
    ///
    /// Records that are already delivered or out of attempts are returned in
    /// their terminal state without another request.
    ///
    /// # Errors
    ///
    /// Returns `RecordMissing` if the record no longer exists and `Storage`
    /// if it cannot be read or saved. HTTP failures are not errors; they
    /// produce `Retrying` or `Exhausted`.
    pub async fn try_deliver(&self, id: DeliveryId) -> Result<RetryState> {
        let policy = &self.inner.config.retry_policy;

        let Some(mut record) = self.inner.deliveries.find_by_id(id).await? else {
            return Err(DeliveryError::RecordMissing { id });
        };

        let resumed = policy.resume(record.attempts, record.delivered);
        if resumed.is_terminal() {
            debug!(delivery_id = %id, state = resumed.as_str(), "record already terminal");
            return Ok(resumed);
        }

        let request = DeliveryRequest::for_record(&record);
        let span = info_span!("webhook_delivery", delivery_id = %id, attempt = request.attempt_number);

        async move {
            self.inner.counters.attempts.fetch_add(1, Ordering::Relaxed);

            let outcome = self
                .inner
                .client
                .deliver(&request)
                .await
                .and_then(|response| response.error_for_status());
            let succeeded = outcome.is_ok();

            record.record_attempt(succeeded, self.inner.clock.now_utc());
            self.inner.deliveries.save(&record).await?;

            let state = policy.decide(record.attempts, succeeded);

            match (&outcome, state) {
                (Ok(response), _) => {
                    self.inner.counters.succeeded.fetch_add(1, Ordering::Relaxed);
                    info!(status = response.status_code, "webhook delivered");
                },
                (Err(e), RetryState::Exhausted { attempts }) => {
                    self.inner.counters.failed.fetch_add(1, Ordering::Relaxed);
                    self.inner.counters.exhausted.fetch_add(1, Ordering::Relaxed);
                    error!(
                        attempts,
                        category = %ErrorCategory::from(e),
                        status = e.status_code(),
                        error = %e,
                        "webhook delivery exhausted"
                    );
                },
                (Err(e), _) => {
                    self.inner.counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        category = %ErrorCategory::from(e),
                        status = e.status_code(),
                        error = %e,
                        next_delay_ms = state.next_delay().map(|d| d.as_millis() as u64),
                        "webhook attempt failed"
                    );
                },
            }

            Ok(state)
        }
        .instrument(span)
        .await
    }

    /// Drives a record to a terminal state on the current task.
    ///
    /// Waits between attempts on the engine's clock. Used by recovery tooling
    /// and tests; regular deliveries go through the pool.
    ///
    /// # Errors
    ///
    /// Same as [`DeliveryEngine::try_deliver`].
    pub async fn deliver_now(&self, id: DeliveryId) -> Result<RetryState> {
        loop {
            match self.try_deliver(id).await? {
                RetryState::Retrying { delay, .. } => self.inner.clock.sleep(delay).await,
                state => return Ok(state),
            }
        }
    }

    /// Re-schedules every record that is neither delivered nor exhausted.
    ///
    /// Returns the number of records handed to the pool.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the pending records cannot be listed.
    pub async fn resume_pending(&self) -> Result<usize> {
        let pending = self
            .inner
            .deliveries
            .find_undelivered(self.inner.config.retry_policy.max_attempts)
            .await?;

        for record in &pending {
            self.schedule(record.id);
        }

        if !pending.is_empty() {
            info!(count = pending.len(), "resumed pending webhook deliveries");
        }
        Ok(pending.len())
    }

    fn schedule(&self, id: DeliveryId) {
        if let Err(e) = self.inner.pool.try_submit(self.clone().drive(id)) {
            warn!(delivery_id = %id, error = %e, "webhook pool rejected delivery, left pending");
        }
    }

    fn schedule_after(&self, id: DeliveryId, delay: Duration) {
        if let Err(e) = self.inner.pool.submit_after(delay, self.clone().drive(id)) {
            warn!(delivery_id = %id, error = %e, "retry not scheduled, left pending");
        }
    }

    /// One attempt followed by a delayed re-submission if another is due.
    fn drive(self, id: DeliveryId) -> BoxFuture<'static, ()> {
        async move {
            match self.try_deliver(id).await {
                Ok(RetryState::Retrying { delay, .. }) => self.schedule_after(id, delay),
                Ok(_) => {},
                Err(e) => {
                    error!(
                        delivery_id = %id,
                        category = %ErrorCategory::from(&e),
                        error = %e,
                        "webhook delivery aborted"
                    );
                },
            }
        }
        .boxed()
    }
}
