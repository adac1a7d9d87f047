use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use paysink_core::{Clock, Payment, PaymentRepository};

use crate::{
    descriptor::{RuleDescriptor, Severity},
    rule::{FraudRule, RuleError, RuleVerdict},
};

/// Look-back window for counting a merchant's recent payments.
pub const FREQUENCY_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Flags merchants submitting many payments in a short window.
///
/// More than 10 payments in the last five minutes scores 0.9, more than 5
/// scores 0.6.
#[derive(Debug, Clone)]
pub struct HighFrequencyRule {
    payments: Arc<dyn PaymentRepository>,
    clock: Arc<dyn Clock>,
}

impl HighFrequencyRule {
    /// Registered rule name.
    pub const NAME: &'static str = "HighFrequency";

    /// Creates the rule over the given payment history.
    pub fn new(payments: Arc<dyn PaymentRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { payments, clock }
    }

    /// Registration metadata.
    pub fn descriptor() -> RuleDescriptor {
        RuleDescriptor::new(Self::NAME).with_order(2).with_severity(Severity::Critical)
    }
}

#[async_trait]
impl FraudRule for HighFrequencyRule {
    async fn evaluate(&self, payment: &Payment) -> Result<RuleVerdict, RuleError> {
        let window = chrono::Duration::from_std(FREQUENCY_WINDOW)
            .map_err(|e| RuleError::Evaluation(e.to_string()))?;
        let since = self.clock.now_utc() - window;

        let count = self.payments.count_by_merchant_created_after(payment.merchant_id, since).await?;

        let verdict = if count > 10 {
            RuleVerdict::flagged(0.9, format!("high transaction frequency: {count} in 5 min"))
        } else if count > 5 {
            RuleVerdict::flagged(0.6, format!("moderate transaction frequency: {count} in 5 min"))
        } else {
            RuleVerdict::clean()
        };

        Ok(verdict)
    }
}
