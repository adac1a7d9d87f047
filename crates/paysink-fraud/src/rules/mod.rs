//! Built-in fraud rules.
//!
//! New rules are added by implementing [`FraudRule`](crate::FraudRule) and
//! listing them in [`default_rules`]; the pipeline itself never changes.

use std::sync::Arc;

use paysink_core::{Clock, PaymentRepository};

use crate::{pipeline::RuleRegistry, rule::FraudRule};

mod high_amount;
mod high_frequency;
mod suspicious_pattern;

pub use high_amount::HighAmountRule;
pub use high_frequency::{HighFrequencyRule, FREQUENCY_WINDOW};
pub use suspicious_pattern::SuspiciousPatternRule;

/// Builds the registry of built-in rules.
pub fn default_rules(payments: Arc<dyn PaymentRepository>, clock: Arc<dyn Clock>) -> RuleRegistry {
    RuleRegistry::builder()
        .register(Arc::new(HighAmountRule::new()) as Arc<dyn FraudRule>, HighAmountRule::descriptor())
        .register(
            Arc::new(HighFrequencyRule::new(payments, clock)) as Arc<dyn FraudRule>,
            HighFrequencyRule::descriptor(),
        )
        .register(
            Arc::new(SuspiciousPatternRule::new()) as Arc<dyn FraudRule>,
            SuspiciousPatternRule::descriptor(),
        )
        .build()
}
