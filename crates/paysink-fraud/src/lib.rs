//! Fraud scoring for incoming payments.
//!
//! A [`FraudPipeline`] runs every enabled [`FraudRule`] in ascending order and
//! combines their verdicts by taking the highest score. Reasons from rules
//! that fired are kept in execution order. A payment scoring at or above
//! [`HIGH_RISK_THRESHOLD`] is considered high risk and is declined by the
//! payment workflow before it is processed.
//!
//! Rules are registered explicitly at startup; [`rules::default_rules`]
//! assembles the built-in set.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod descriptor;
pub mod pipeline;
pub mod rule;
pub mod rules;

pub use descriptor::{RuleDescriptor, Severity};
pub use pipeline::{FraudEvaluation, FraudPipeline, PipelineConfig, RuleRegistry, HIGH_RISK_THRESHOLD};
pub use rule::{FraudRule, RuleError, RuleVerdict};
pub use rules::{default_rules, HighAmountRule, HighFrequencyRule, SuspiciousPatternRule};
