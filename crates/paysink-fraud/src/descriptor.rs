//! Static metadata attached to each fraud rule.

use std::fmt;

use paysink_core::Descriptor;
use serde::{Deserialize, Serialize};

/// How serious a rule's findings are considered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Informational.
    Low,
    /// Default severity.
    #[default]
    Medium,
    /// Strong fraud indicator.
    High,
    /// Near-certain fraud indicator.
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

/// Registration metadata of a fraud rule.
///
/// Immutable once the rule registry is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleDescriptor {
    /// Unique rule name.
    pub name: String,

    /// Disabled rules stay registered but never run.
    pub enabled: bool,

    /// Severity of the rule's findings.
    pub severity: Severity,

    /// Execution order, lower runs first.
    pub order: i32,

    /// Per-rule score threshold, consulted only when threshold gating is
    /// enabled on the pipeline.
    pub threshold: f64,
}

impl RuleDescriptor {
    /// Default execution order.
    pub const DEFAULT_ORDER: i32 = 10;

    /// Default per-rule threshold.
    pub const DEFAULT_THRESHOLD: f64 = 0.7;

    /// Creates a descriptor with default metadata.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            severity: Severity::default(),
            order: Self::DEFAULT_ORDER,
            threshold: Self::DEFAULT_THRESHOLD,
        }
    }

    /// Sets the execution order.
    #[must_use]
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Sets the severity.
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Sets the per-rule threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Marks the rule disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl Default for RuleDescriptor {
    fn default() -> Self {
        Self::new("unnamed")
    }
}

impl Descriptor for RuleDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let descriptor = RuleDescriptor::new("Velocity");

        assert!(descriptor.enabled);
        assert_eq!(descriptor.severity, Severity::Medium);
        assert_eq!(descriptor.order, 10);
        assert!((descriptor.threshold - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn builder_overrides() {
        let descriptor = RuleDescriptor::new("HighAmount")
            .with_order(1)
            .with_severity(Severity::High)
            .disabled();

        assert_eq!(descriptor.order, 1);
        assert_eq!(descriptor.severity, Severity::High);
        assert!(!descriptor.is_enabled());
    }
}
