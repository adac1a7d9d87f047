//! Max-aggregating evaluation over the rule registry.

use std::{panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use paysink_core::{worker_pool::panic_message, Payment, PluginRegistry};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{descriptor::RuleDescriptor, rule::FraudRule};

/// Score at or above which a payment is high risk.
pub const HIGH_RISK_THRESHOLD: f64 = 0.7;

/// Registry of fraud rules.
pub type RuleRegistry = PluginRegistry<dyn FraudRule, RuleDescriptor>;

/// Pipeline behavior switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Only count a rule's score when it reaches that rule's own
    /// `threshold`. Off by default.
    pub gate_by_rule_threshold: bool,
}

/// Combined result of all rules for one payment. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FraudEvaluation {
    /// Highest score reported by any rule, in `[0, 1]`.
    pub score: f64,

    /// Reasons of the rules that fired, in execution order.
    pub reasons: Vec<String>,
}

impl FraudEvaluation {
    /// Whether the payment must be declined.
    pub fn is_high_risk(&self) -> bool {
        self.score >= HIGH_RISK_THRESHOLD
    }

    /// Reasons joined with `"; "`.
    pub fn summary(&self) -> String {
        self.reasons.join("; ")
    }
}

/// Runs the enabled rules in order and keeps the maximum score.
#[derive(Debug, Clone)]
pub struct FraudPipeline {
    rules: Arc<RuleRegistry>,
    config: PipelineConfig,
}

impl FraudPipeline {
    /// Creates a pipeline with default behavior.
    pub fn new(rules: Arc<RuleRegistry>) -> Self {
        Self::with_config(rules, PipelineConfig::default())
    }

    /// Creates a pipeline with explicit behavior switches.
    pub fn with_config(rules: Arc<RuleRegistry>, config: PipelineConfig) -> Self {
        Self { rules, config }
    }

    /// The rule registry in use.
    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    /// Scores a payment.
    ///
    /// Never fails: a rule that errors or panics is logged and contributes
    /// nothing, and the remaining rules still run.
    pub async fn evaluate(&self, payment: &Payment) -> FraudEvaluation {
        let span = info_span!("fraud_evaluation", payment_id = %payment.id);
        self.evaluate_inner(payment).instrument(span).await
    }

    async fn evaluate_inner(&self, payment: &Payment) -> FraudEvaluation {
        let mut evaluation = FraudEvaluation::default();

        for entry in self.rules.all_enabled() {
            let rule = &entry.descriptor.name;

            let verdict = match AssertUnwindSafe(entry.plugin.evaluate(payment)).catch_unwind().await
            {
                Ok(Ok(verdict)) => verdict,
                Ok(Err(err)) => {
                    warn!(rule = %rule, error = %err, "fraud rule failed, scoring as 0");
                    continue;
                },
                Err(panic) => {
                    error!(
                        rule = %rule,
                        panic = %panic_message(panic.as_ref()),
                        "fraud rule panicked, scoring as 0"
                    );
                    continue;
                },
            };

            if !verdict.is_flagged() {
                continue;
            }
            // Verdicts built by hand bypass `RuleVerdict::flagged`.
            let score = verdict.score.clamp(0.0, 1.0);

            if self.config.gate_by_rule_threshold && score < entry.descriptor.threshold {
                debug!(
                    rule = %rule,
                    score,
                    threshold = entry.descriptor.threshold,
                    "rule score below its threshold, ignored"
                );
                continue;
            }

            debug!(rule = %rule, score, "fraud rule fired");
            evaluation.score = evaluation.score.max(score);
            if let Some(reason) = verdict.reason.filter(|reason| !reason.is_empty()) {
                evaluation.reasons.push(reason);
            }
        }

        info!(
            score = evaluation.score,
            high_risk = evaluation.is_high_risk(),
            reasons = %evaluation.summary(),
            "fraud evaluation complete"
        );

        evaluation
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use paysink_core::MerchantId;
    use paysink_testing::PaymentBuilder;

    use super::*;
    use crate::rule::{RuleError, RuleVerdict};

    #[derive(Debug)]
    struct Fixed(f64, &'static str);

    #[async_trait]
    impl FraudRule for Fixed {
        async fn evaluate(&self, _payment: &Payment) -> Result<RuleVerdict, RuleError> {
            Ok(RuleVerdict::flagged(self.0, self.1))
        }
    }

    /// Builds its verdict directly, skipping the clamping constructor.
    #[derive(Debug)]
    struct Overshooting;

    #[async_trait]
    impl FraudRule for Overshooting {
        async fn evaluate(&self, _payment: &Payment) -> Result<RuleVerdict, RuleError> {
            Ok(RuleVerdict { score: 1.4, reason: Some("overshoot".to_string()) })
        }
    }

    #[derive(Debug)]
    struct Broken;

    #[async_trait]
    impl FraudRule for Broken {
        async fn evaluate(&self, _payment: &Payment) -> Result<RuleVerdict, RuleError> {
            Err(RuleError::Evaluation("history unavailable".to_string()))
        }
    }

    #[derive(Debug)]
    struct Panicking;

    #[async_trait]
    impl FraudRule for Panicking {
        async fn evaluate(&self, _payment: &Payment) -> Result<RuleVerdict, RuleError> {
            panic!("rule bug")
        }
    }

    fn registry(rules: Vec<(Arc<dyn FraudRule>, RuleDescriptor)>) -> Arc<RuleRegistry> {
        let builder = rules.into_iter().fold(RuleRegistry::builder(), |builder, (rule, descriptor)| {
            builder.register(rule, descriptor)
        });
        Arc::new(builder.build())
    }

    fn entry(
        rule: impl FraudRule + 'static,
        descriptor: RuleDescriptor,
    ) -> (Arc<dyn FraudRule>, RuleDescriptor) {
        (Arc::new(rule), descriptor)
    }

    fn payment() -> Payment {
        PaymentBuilder::new(MerchantId::new()).build()
    }

    #[tokio::test]
    async fn takes_maximum_not_sum() {
        let pipeline = FraudPipeline::new(registry(vec![
            entry(Fixed(0.6, "first"), RuleDescriptor::new("a").with_order(1)),
            entry(Fixed(0.3, "second"), RuleDescriptor::new("b").with_order(2)),
        ]));

        let evaluation = pipeline.evaluate(&payment()).await;

        assert!((evaluation.score - 0.6).abs() < f64::EPSILON);
        assert!(!evaluation.is_high_risk());
        assert_eq!(evaluation.reasons, vec!["first", "second"]);
        assert_eq!(evaluation.summary(), "first; second");
    }

    #[tokio::test]
    async fn failing_and_panicking_rules_score_zero() {
        let pipeline = FraudPipeline::new(registry(vec![
            entry(Broken, RuleDescriptor::new("broken").with_order(1)),
            entry(Panicking, RuleDescriptor::new("panicking").with_order(2)),
            entry(Fixed(0.4, "survivor"), RuleDescriptor::new("ok").with_order(3)),
        ]));

        let evaluation = pipeline.evaluate(&payment()).await;

        assert!((evaluation.score - 0.4).abs() < f64::EPSILON);
        assert_eq!(evaluation.reasons, vec!["survivor"]);
    }

    #[tokio::test]
    async fn disabled_rules_do_not_run() {
        let pipeline = FraudPipeline::new(registry(vec![entry(
            Fixed(0.95, "disabled"),
            RuleDescriptor::new("off").disabled(),
        )]));

        let evaluation = pipeline.evaluate(&payment()).await;

        assert!(evaluation.score.abs() < f64::EPSILON);
        assert!(evaluation.reasons.is_empty());
    }

    #[tokio::test]
    async fn threshold_gating_is_opt_in() {
        let rules = registry(vec![
            entry(Fixed(0.5, "below"), RuleDescriptor::new("low").with_threshold(0.7)),
            entry(Fixed(0.75, "above"), RuleDescriptor::new("high").with_threshold(0.7)),
        ]);

        let ungated = FraudPipeline::new(Arc::clone(&rules)).evaluate(&payment()).await;
        assert_eq!(ungated.reasons, vec!["below", "above"]);

        let gated = FraudPipeline::with_config(rules, PipelineConfig { gate_by_rule_threshold: true })
            .evaluate(&payment())
            .await;
        assert_eq!(gated.reasons, vec!["above"]);
        assert!((gated.score - 0.75).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn out_of_range_scores_are_clamped() {
        let pipeline = FraudPipeline::new(registry(vec![
            entry(Overshooting, RuleDescriptor::new("over").with_order(1)),
            entry(Fixed(0.3, "modest"), RuleDescriptor::new("modest").with_order(2)),
        ]));

        let evaluation = pipeline.evaluate(&payment()).await;

        assert!((evaluation.score - 1.0).abs() < f64::EPSILON);
        assert!(evaluation.is_high_risk());
        assert_eq!(evaluation.reasons, vec!["overshoot", "modest"]);
    }

    #[test]
    fn high_risk_cutoff_is_inclusive() {
        let at = FraudEvaluation { score: 0.7, reasons: vec![] };
        let below = FraudEvaluation { score: 0.69, reasons: vec![] };

        assert!(at.is_high_risk());
        assert!(!below.is_high_risk());
    }
}
