//! Payment lifecycle orchestration.
//!
//! ```text
//! create_payment ──▶ FraudPipeline ──┬─ high risk ─▶ DECLINED ─▶ dispatch + webhook
//!                                    └─ otherwise ─▶ PENDING ─▶ dispatch
//!                                                       │
//!                                  payment pool ◀───────┘
//!                                       │ (processing delay)
//!                                       ▼
//!                          APPROVED | DECLINED ─▶ dispatch + webhook
//! ```
//!
//! Fraud evaluation runs before the payment is saved; sinks and webhooks run
//! after. Sink and delivery failures are logged where they happen and never
//! reach the caller.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use paysink_core::{
    Clock, CoreError, Merchant, MerchantId, MerchantRepository, Payment, PaymentId,
    PaymentRepository, PaymentStatus, WebhookEvent, WorkerPool,
};
use paysink_delivery::DeliveryEngine;
use paysink_dispatch::DispatchEngine;
use paysink_fraud::FraudPipeline;
use rand::Rng;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Errors returned to callers of the workflow.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Unknown or inactive merchant.
    #[error("merchant is not authorized")]
    Unauthorized,

    /// The payment belongs to another merchant.
    #[error("payment {0} belongs to another merchant")]
    Forbidden(PaymentId),

    /// No such payment.
    #[error("payment {0} not found")]
    NotFound(PaymentId),

    /// The request cannot be processed as given.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Persistence failed.
    #[error(transparent)]
    Storage(#[from] CoreError),
}

/// Result type alias for workflow operations.
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Supported payment methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    /// Credit card, 1 to 12 installments.
    Card,
    /// Debit, single installment.
    Debit,
}

impl PaymentMethod {
    /// Most installments a card payment may be split into.
    pub const MAX_CARD_INSTALLMENTS: u32 = 12;

    /// Parses a method name, ignoring case.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "CARD" => Some(Self::Card),
            "DEBIT" => Some(Self::Debit),
            _ => None,
        }
    }

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Card => "CARD",
            Self::Debit => "DEBIT",
        }
    }

    /// Checks the installment count for this method.
    fn check_installments(self, installments: u32) -> Result<u32> {
        match self {
            Self::Card if (1..=Self::MAX_CARD_INSTALLMENTS).contains(&installments) => {
                Ok(installments)
            },
            Self::Card => Err(WorkflowError::InvalidRequest(format!(
                "card payments allow 1 to {} installments",
                Self::MAX_CARD_INSTALLMENTS
            ))),
            Self::Debit if installments <= 1 => Ok(1),
            Self::Debit => {
                Err(WorkflowError::InvalidRequest("debit payments cannot be split".to_string()))
            },
        }
    }
}

/// A merchant's request to charge a customer.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatePayment {
    /// Payment method name, e.g. `"CARD"`.
    pub method: String,
    /// Amount, strictly positive.
    pub amount: Decimal,
    /// ISO currency code.
    pub currency: String,
    /// Installments; defaults to 1.
    pub installments: Option<u32>,
    /// Replays with the same key return the original payment.
    pub idempotency_key: Option<String>,
    /// Merchant's own order reference.
    pub order_id: Option<String>,
}

/// Acknowledgement of a refund request.
#[derive(Debug, Clone, PartialEq)]
pub struct RefundReceipt {
    /// Refund identifier, `ref_` prefixed.
    pub id: String,
    /// Refunded payment.
    pub payment_id: PaymentId,
    /// When the refund was recorded.
    pub requested_at: DateTime<Utc>,
}

/// How asynchronous processing decides payments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessingSettings {
    /// Simulated processing time before the decision.
    pub processing_delay: Duration,
    /// Probability in `[0, 1]` of declining.
    pub failure_rate: f64,
}

/// Collaborators used by [`PaymentWorkflow`].
#[derive(Debug, Clone)]
pub struct WorkflowParts {
    /// Payment store.
    pub payments: Arc<dyn PaymentRepository>,
    /// Merchant store.
    pub merchants: Arc<dyn MerchantRepository>,
    /// Fraud scoring.
    pub fraud: Arc<FraudPipeline>,
    /// Internal sink fan-out.
    pub dispatch: Arc<DispatchEngine>,
    /// Merchant webhooks.
    pub delivery: DeliveryEngine,
    /// Pool running payment processing.
    pub processing_pool: Arc<WorkerPool>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Processing behavior.
    pub settings: ProcessingSettings,
}

/// Orchestrates fraud screening, status transitions, sink dispatch and
/// webhooks for payments.
///
/// Cloning is cheap; clones share every collaborator.
#[derive(Debug, Clone)]
pub struct PaymentWorkflow {
    parts: Arc<WorkflowParts>,
}

impl PaymentWorkflow {
    /// Creates a workflow over `parts`.
    pub fn new(parts: WorkflowParts) -> Self {
        Self { parts: Arc::new(parts) }
    }

    /// Resolves an active merchant.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` if the merchant is unknown or blocked.
    pub async fn authenticate(&self, merchant_id: MerchantId) -> Result<Merchant> {
        match self.parts.merchants.find_by_id(merchant_id).await? {
            Some(merchant) if merchant.is_active() => Ok(merchant),
            _ => Err(WorkflowError::Unauthorized),
        }
    }

    /// Accepts a payment for asynchronous processing.
    ///
    /// High-risk payments are declined immediately. Others are saved as
    /// `PENDING` and decided later on the payment pool.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized`, `InvalidRequest` or `Storage`.
    pub async fn create_payment(
        &self,
        merchant_id: MerchantId,
        request: CreatePayment,
    ) -> Result<Payment> {
        let merchant = self.authenticate(merchant_id).await?;

        if let Some(key) = request.idempotency_key.as_deref() {
            if let Some(existing) =
                self.parts.payments.find_by_idempotency_key(merchant.id, key).await?
            {
                debug!(payment_id = %existing.id, "idempotent replay");
                return Ok(existing);
            }
        }

        let mut payment = self.build_payment(merchant.id, request)?;
        let span = info_span!("create_payment", payment_id = %payment.id, merchant_id = %merchant.id);

        async move {
            let evaluation = self.parts.fraud.evaluate(&payment).await;
            info!(score = evaluation.score, reasons = %evaluation.summary(), "fraud evaluation");

            if evaluation.is_high_risk() {
                warn!(reasons = %evaluation.summary(), "payment auto-declined");
                payment.transition(PaymentStatus::Declined, self.parts.clock.now_utc());
                self.parts.payments.save(&payment).await?;
                self.publish(&payment).await;
                return Ok(payment);
            }

            self.parts.payments.save(&payment).await?;
            self.publish_internal(&payment).await;
            self.schedule_processing(payment.id);

            Ok(payment)
        }
        .instrument(span)
        .await
    }

    /// Loads a payment.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if it does not exist.
    pub async fn get_payment(&self, payment_id: PaymentId) -> Result<Payment> {
        self.parts.payments.find_by_id(payment_id).await?.ok_or(WorkflowError::NotFound(payment_id))
    }

    /// Refunds one of the merchant's payments.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized`, `NotFound`, `Forbidden`, or `InvalidRequest`
    /// for a payment that is already refunded.
    pub async fn refund(
        &self,
        merchant_id: MerchantId,
        payment_id: PaymentId,
    ) -> Result<RefundReceipt> {
        let merchant = self.authenticate(merchant_id).await?;
        let mut payment = self.get_payment(payment_id).await?;

        if payment.merchant_id != merchant.id {
            return Err(WorkflowError::Forbidden(payment_id));
        }
        if payment.status == PaymentStatus::Refunded {
            return Err(WorkflowError::InvalidRequest(format!(
                "payment {payment_id} is already refunded"
            )));
        }

        let now = self.parts.clock.now_utc();
        payment.transition(PaymentStatus::Refunded, now);
        self.parts.payments.save(&payment).await?;
        info!(payment_id = %payment.id, "payment refunded");

        self.publish(&payment).await;

        Ok(RefundReceipt {
            id: format!("ref_{}", Uuid::new_v4().simple()),
            payment_id,
            requested_at: now,
        })
    }

    /// Decides a pending payment after the processing delay.
    ///
    /// Payments that left `PENDING` in the meantime are left alone.
    pub async fn process(&self, payment_id: PaymentId) -> Result<Option<Payment>> {
        self.parts.clock.sleep(self.parts.settings.processing_delay).await;

        let Some(mut payment) = self.parts.payments.find_by_id(payment_id).await? else {
            warn!(payment_id = %payment_id, "payment vanished before processing");
            return Ok(None);
        };
        if payment.status != PaymentStatus::Pending {
            debug!(payment_id = %payment_id, status = %payment.status, "already decided");
            return Ok(None);
        }

        let approved = rand::rng().random::<f64>() >= self.parts.settings.failure_rate;
        let status = if approved { PaymentStatus::Approved } else { PaymentStatus::Declined };

        payment.transition(status, self.parts.clock.now_utc());
        self.parts.payments.save(&payment).await?;
        info!(payment_id = %payment.id, status = %payment.status, "payment processed");

        self.publish(&payment).await;
        Ok(Some(payment))
    }

    fn build_payment(&self, merchant_id: MerchantId, request: CreatePayment) -> Result<Payment> {
        let method = PaymentMethod::parse(&request.method).ok_or_else(|| {
            WorkflowError::InvalidRequest(format!("unsupported payment method: {}", request.method))
        })?;
        if request.amount <= Decimal::ZERO {
            return Err(WorkflowError::InvalidRequest("amount must be positive".to_string()));
        }
        if request.currency.trim().is_empty() {
            return Err(WorkflowError::InvalidRequest("currency is required".to_string()));
        }
        let installments = method.check_installments(request.installments.unwrap_or(1))?;

        let now = self.parts.clock.now_utc();
        Ok(Payment {
            id: PaymentId::new(),
            merchant_id,
            method: method.as_str().to_string(),
            amount: request.amount,
            currency: request.currency.trim().to_ascii_uppercase(),
            installments,
            status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
            idempotency_key: request.idempotency_key,
            metadata_order_id: request.order_id,
        })
    }

    fn schedule_processing(&self, payment_id: PaymentId) {
        let workflow = self.clone();
        let job = async move {
            if let Err(e) = workflow.process(payment_id).await {
                error!(payment_id = %payment_id, error = %e, "payment processing failed");
            }
        };

        if let Err(e) = self.parts.processing_pool.try_submit(job) {
            error!(payment_id = %payment_id, error = %e, "payment left pending, pool rejected it");
        }
    }

    /// Internal sinks only.
    async fn publish_internal(&self, payment: &Payment) {
        let event = WebhookEvent::from_payment(payment, self.parts.clock.now_utc());
        let report = self.parts.dispatch.dispatch(event).await;
        debug!(
            event_kind = %report.event_kind,
            sync = report.sync_outcomes.len(),
            queued = report.queued.len(),
            rejected = report.rejected.len(),
            "sinks notified"
        );
    }

    /// Internal sinks followed by the merchant webhook.
    async fn publish(&self, payment: &Payment) {
        self.publish_internal(payment).await;
        self.parts.delivery.send_webhook(payment).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_are_case_insensitive() {
        assert_eq!(PaymentMethod::parse("card"), Some(PaymentMethod::Card));
        assert_eq!(PaymentMethod::parse(" Debit "), Some(PaymentMethod::Debit));
        assert_eq!(PaymentMethod::parse("PIX"), None);
    }

    #[test]
    fn installment_limits_per_method() {
        assert_eq!(PaymentMethod::Card.check_installments(12).ok(), Some(12));
        assert!(PaymentMethod::Card.check_installments(0).is_err());
        assert!(PaymentMethod::Card.check_installments(13).is_err());
        assert_eq!(PaymentMethod::Debit.check_installments(0).ok(), Some(1));
        assert!(PaymentMethod::Debit.check_installments(2).is_err());
    }
}
