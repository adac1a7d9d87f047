use async_trait::async_trait;
use paysink_core::Payment;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::{
    descriptor::{RuleDescriptor, Severity},
    rule::{FraudRule, RuleError, RuleVerdict},
};

const PATTERN_AMOUNT: Decimal = dec!(25000.00);
const TEST_ORDER_PREFIX: &str = "TEST-";

/// Flags known suspicious shapes: the exact amount 25000.00 (0.60) and test
/// order references reaching production (0.3).
#[derive(Debug, Clone, Copy, Default)]
pub struct SuspiciousPatternRule;

impl SuspiciousPatternRule {
    /// Registered rule name.
    pub const NAME: &'static str = "SuspiciousPattern";

    /// Creates the rule.
    pub fn new() -> Self {
        Self
    }

    /// Registration metadata.
    pub fn descriptor() -> RuleDescriptor {
        RuleDescriptor::new(Self::NAME).with_order(3).with_severity(Severity::Medium)
    }
}

#[async_trait]
impl FraudRule for SuspiciousPatternRule {
    async fn evaluate(&self, payment: &Payment) -> Result<RuleVerdict, RuleError> {
        // Decimal equality ignores scale, so 25000 and 25000.00 both match.
        if payment.amount == PATTERN_AMOUNT {
            return Ok(RuleVerdict::flagged(0.60, "suspicious amount pattern detected"));
        }

        let is_test_order = payment
            .metadata_order_id
            .as_deref()
            .is_some_and(|order_id| order_id.starts_with(TEST_ORDER_PREFIX));
        if is_test_order {
            return Ok(RuleVerdict::flagged(0.3, "test order in production"));
        }

        Ok(RuleVerdict::clean())
    }
}
