//! The fraud rule contract.

use std::fmt;

use async_trait::async_trait;
use paysink_core::{CoreError, Payment};
use thiserror::Error;

/// Outcome of a single rule for a single payment.
///
/// The reason travels with the score, so rules hold no per-call state.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleVerdict {
    /// Risk score in `[0, 1]`.
    pub score: f64,

    /// Human readable explanation when the rule fired.
    pub reason: Option<String>,
}

impl RuleVerdict {
    /// Verdict of a rule that found nothing.
    pub fn clean() -> Self {
        Self { score: 0.0, reason: None }
    }

    /// Verdict of a rule that fired. The score is clamped to `[0, 1]`.
    pub fn flagged(score: f64, reason: impl Into<String>) -> Self {
        let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
        Self { score, reason: Some(reason.into()) }
    }

    /// Whether the rule contributed a positive score.
    pub fn is_flagged(&self) -> bool {
        self.score > 0.0
    }
}

/// Errors a rule may report instead of a verdict.
#[derive(Debug, Error)]
pub enum RuleError {
    /// A collaborator lookup failed.
    #[error("lookup failed: {0}")]
    Lookup(#[from] CoreError),

    /// The rule could not evaluate the payment.
    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

/// A single fraud heuristic.
///
/// Rules are stateless apart from read-only collaborators injected at
/// construction and may be evaluated concurrently.
#[async_trait]
pub trait FraudRule: Send + Sync + fmt::Debug {
    /// Scores the payment.
    async fn evaluate(&self, payment: &Payment) -> Result<RuleVerdict, RuleError>;
}
