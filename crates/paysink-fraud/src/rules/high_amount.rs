use async_trait::async_trait;
use paysink_core::Payment;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::{
    descriptor::{RuleDescriptor, Severity},
    rule::{FraudRule, RuleError, RuleVerdict},
};

const VERY_HIGH_AMOUNT: Decimal = dec!(10000);
const ELEVATED_AMOUNT: Decimal = dec!(5000);

/// Flags unusually large amounts.
///
/// Above 10000 scores 0.85, above 5000 scores 0.55.
#[derive(Debug, Clone, Copy, Default)]
pub struct HighAmountRule;

impl HighAmountRule {
    /// Registered rule name.
    pub const NAME: &'static str = "HighAmount";

    /// Creates the rule.
    pub fn new() -> Self {
        Self
    }

    /// Registration metadata.
    pub fn descriptor() -> RuleDescriptor {
        RuleDescriptor::new(Self::NAME).with_order(1).with_severity(Severity::High)
    }
}

#[async_trait]
impl FraudRule for HighAmountRule {
    async fn evaluate(&self, payment: &Payment) -> Result<RuleVerdict, RuleError> {
        let amount = payment.amount;

        let verdict = if amount > VERY_HIGH_AMOUNT {
            RuleVerdict::flagged(0.85, format!("very high amount: {amount}"))
        } else if amount > ELEVATED_AMOUNT {
            RuleVerdict::flagged(0.55, format!("elevated amount: {amount}"))
        } else {
            RuleVerdict::clean()
        };

        Ok(verdict)
    }
}
