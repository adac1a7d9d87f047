//! Service configuration.

use std::time::Duration;

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use paysink_core::PoolConfig;
use paysink_delivery::{BackoffStrategy, ClientConfig, DeliveryConfig, RetryPolicy};
use paysink_fraud::PipelineConfig;
use serde::{Deserialize, Serialize};

use crate::workflow::ProcessingSettings;

const CONFIG_FILE: &str = "paysink.toml";
const ENV_PREFIX: &str = "PAYSINK_";

/// Complete service configuration with defaults, file, and environment
/// overrides.
///
/// Configuration is loaded in priority order:
/// 1. Environment variables prefixed with `PAYSINK_` (highest priority)
/// 2. Configuration file (`paysink.toml`)
/// 3. Built-in defaults (lowest priority)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Webhooks
    /// Shared secret for webhook signatures.
    ///
    /// Environment variable: `PAYSINK_WEBHOOK_SECRET`
    pub webhook_secret: String,
    /// HTTP timeout for one webhook attempt, in seconds.
    ///
    /// Environment variable: `PAYSINK_DELIVERY_TIMEOUT_SECONDS`
    pub delivery_timeout_seconds: u64,
    /// Attempts per webhook, including the first.
    ///
    /// Environment variable: `PAYSINK_MAX_DELIVERY_ATTEMPTS`
    pub max_delivery_attempts: u32,
    /// Linear backoff step between attempts, in milliseconds.
    ///
    /// Environment variable: `PAYSINK_RETRY_BASE_DELAY_MS`
    pub retry_base_delay_ms: u64,
    /// Upper bound on a single backoff, in milliseconds.
    ///
    /// Environment variable: `PAYSINK_RETRY_MAX_DELAY_MS`
    pub retry_max_delay_ms: u64,

    // Processing
    /// Simulated processing time before a payment is decided.
    ///
    /// Environment variable: `PAYSINK_PROCESSING_DELAY_MS`
    pub processing_delay_ms: u64,
    /// Probability in `[0, 1]` that processing declines a payment.
    ///
    /// Environment variable: `PAYSINK_FAILURE_RATE`
    pub failure_rate: f64,
    /// Count a fraud rule only when it reaches its own threshold.
    ///
    /// Environment variable: `PAYSINK_GATE_BY_RULE_THRESHOLD`
    pub gate_by_rule_threshold: bool,

    // Pools
    /// Workers processing payments.
    ///
    /// Environment variable: `PAYSINK_PAYMENT_WORKERS`
    pub payment_workers: usize,
    /// Payments that may wait for a worker.
    ///
    /// Environment variable: `PAYSINK_PAYMENT_QUEUE_CAPACITY`
    pub payment_queue_capacity: usize,
    /// Workers running webhook deliveries and async sinks.
    ///
    /// Environment variable: `PAYSINK_WEBHOOK_WORKERS`
    pub webhook_workers: usize,
    /// Webhook and async sink jobs that may wait for a worker.
    ///
    /// Environment variable: `PAYSINK_WEBHOOK_QUEUE_CAPACITY`
    pub webhook_queue_capacity: usize,
    /// Time allowed for pools to drain on shutdown, in seconds.
    ///
    /// Environment variable: `PAYSINK_SHUTDOWN_TIMEOUT_SECONDS`
    pub shutdown_timeout_seconds: u64,

    // Logging
    /// Log filter used when `RUST_LOG` is unset.
    ///
    /// Environment variable: `PAYSINK_LOG`
    pub log: String,
}

impl Config {
    /// Load configuration from defaults, `paysink.toml` and `PAYSINK_`
    /// environment variables.
    pub fn load() -> Result<Self> {
        Self::from_figment(Self::figment())
    }

    /// The layered provider used by [`Config::load`].
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Extracts and validates a configuration from `figment`.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.webhook_secret.trim().is_empty() {
            anyhow::bail!("webhook_secret must not be empty");
        }

        if !(0.0..=1.0).contains(&self.failure_rate) {
            anyhow::bail!("failure_rate must be between 0.0 and 1.0");
        }

        if self.delivery_timeout_seconds == 0 {
            anyhow::bail!("delivery_timeout_seconds must be greater than 0");
        }

        if self.max_delivery_attempts == 0 {
            anyhow::bail!("max_delivery_attempts must be greater than 0");
        }

        if self.retry_max_delay_ms < self.retry_base_delay_ms {
            anyhow::bail!("retry_max_delay_ms cannot be lower than retry_base_delay_ms");
        }

        self.payment_pool_config().validate().context("invalid payment pool")?;
        self.webhook_pool_config().validate().context("invalid webhook pool")?;

        Ok(())
    }

    /// Sizing of the payment processing pool.
    pub fn payment_pool_config(&self) -> PoolConfig {
        PoolConfig::new("payments", self.payment_workers, self.payment_queue_capacity)
    }

    /// Sizing of the pool shared by webhook deliveries and async sinks.
    pub fn webhook_pool_config(&self) -> PoolConfig {
        PoolConfig::new("webhooks", self.webhook_workers, self.webhook_queue_capacity)
    }

    /// Convert to the delivery crate's configuration.
    pub fn to_delivery_config(&self) -> DeliveryConfig {
        DeliveryConfig::new(self.webhook_secret.clone())
            .with_client(self.to_client_config())
            .with_retry_policy(self.to_retry_policy())
    }

    /// Convert to client configuration.
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(self.delivery_timeout_seconds),
            ..ClientConfig::default()
        }
    }

    /// Convert to retry policy.
    pub fn to_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_delivery_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            jitter_factor: 0.0,
            backoff_strategy: BackoffStrategy::Linear,
        }
    }

    /// Convert to the fraud pipeline switches.
    pub fn to_pipeline_config(&self) -> PipelineConfig {
        PipelineConfig { gate_by_rule_threshold: self.gate_by_rule_threshold }
    }

    /// Convert to payment processing settings.
    pub fn to_processing_settings(&self) -> ProcessingSettings {
        ProcessingSettings {
            processing_delay: Duration::from_millis(self.processing_delay_ms),
            failure_rate: self.failure_rate,
        }
    }

    /// Shutdown drain timeout.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            webhook_secret: "paysink-dev-secret".to_string(),
            delivery_timeout_seconds: 30,
            max_delivery_attempts: 5,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 60_000,
            processing_delay_ms: 1500,
            failure_rate: 0.15,
            gate_by_rule_threshold: false,
            payment_workers: 3,
            payment_queue_capacity: 50,
            webhook_workers: 5,
            webhook_queue_capacity: 100,
            shutdown_timeout_seconds: 30,
            log: "info,paysink=debug".to_string(),
        }
    }
}
