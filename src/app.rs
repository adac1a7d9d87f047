//! Wiring of stores, pools, registries and engines.

use std::sync::Arc;

use anyhow::{Context, Result};
use paysink_core::{
    Clock, EventSink, InMemoryDeliveryRepository, InMemoryMerchantRepository,
    InMemoryPaymentRepository, RegistryBuilder, WorkerPool,
};
use paysink_delivery::DeliveryEngine;
use paysink_dispatch::{BuiltinSinks, DispatchEngine, SinkDescriptor, SinkRegistry};
use paysink_fraud::{default_rules, FraudPipeline};
use tracing::{info, warn};

use crate::{
    config::Config,
    workflow::{PaymentWorkflow, WorkflowParts},
};

/// Builder for the sink registry, handed to [`App::build_with_sinks`].
pub type SinkRegistryBuilder = RegistryBuilder<dyn EventSink, SinkDescriptor>;

/// A fully wired payment service over in-memory stores.
#[derive(Debug)]
pub struct App {
    /// Entry point for payment operations.
    pub workflow: PaymentWorkflow,
    /// Webhook delivery engine.
    pub delivery: DeliveryEngine,
    /// Built-in sinks, for inspecting their state.
    pub sinks: BuiltinSinks,
    /// Payment store.
    pub payments: InMemoryPaymentRepository,
    /// Merchant store.
    pub merchants: InMemoryMerchantRepository,
    /// Delivery record store.
    pub deliveries: InMemoryDeliveryRepository,
    processing_pool: Arc<WorkerPool>,
    webhook_pool: Arc<WorkerPool>,
}

impl App {
    /// Wires the service with the built-in sinks and rules.
    pub fn build(config: &Config, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::build_with_sinks(config, clock, |builder| builder)
    }

    /// Wires the service, letting `extra_sinks` register sinks next to the
    /// built-in ones.
    pub fn build_with_sinks(
        config: &Config,
        clock: Arc<dyn Clock>,
        extra_sinks: impl FnOnce(SinkRegistryBuilder) -> SinkRegistryBuilder,
    ) -> Result<Self> {
        config.validate()?;

        let payments = InMemoryPaymentRepository::new();
        let merchants = InMemoryMerchantRepository::new();
        let deliveries = InMemoryDeliveryRepository::new();

        let processing_pool = WorkerPool::start(config.payment_pool_config(), Arc::clone(&clock))
            .context("failed to start payment pool")?;
        let webhook_pool = WorkerPool::start(config.webhook_pool_config(), Arc::clone(&clock))
            .context("failed to start webhook pool")?;

        let rules = default_rules(Arc::new(payments.clone()), Arc::clone(&clock));
        let fraud = FraudPipeline::with_config(Arc::new(rules), config.to_pipeline_config());
        let rule_count = fraud.rules().enabled_count();

        let sinks = BuiltinSinks::new(Arc::clone(&clock));
        let registry: SinkRegistry = extra_sinks(sinks.register(SinkRegistry::builder())).build();
        let dispatch = DispatchEngine::new(&registry, Arc::clone(&webhook_pool))
            .context("invalid sink registry")?;

        let delivery = DeliveryEngine::new(
            config.to_delivery_config(),
            Arc::new(merchants.clone()),
            Arc::new(deliveries.clone()),
            Arc::clone(&webhook_pool),
            Arc::clone(&clock),
        )
        .context("invalid delivery configuration")?;

        let workflow = PaymentWorkflow::new(WorkflowParts {
            payments: Arc::new(payments.clone()),
            merchants: Arc::new(merchants.clone()),
            fraud: Arc::new(fraud),
            dispatch: Arc::new(dispatch),
            delivery: delivery.clone(),
            processing_pool: Arc::clone(&processing_pool),
            clock,
            settings: config.to_processing_settings(),
        });

        info!(
            rules = rule_count,
            sinks = registry.enabled_count(),
            payment_workers = config.payment_workers,
            webhook_workers = config.webhook_workers,
            "paysink wired"
        );

        Ok(Self {
            workflow,
            delivery,
            sinks,
            payments,
            merchants,
            deliveries,
            processing_pool,
            webhook_pool,
        })
    }

    /// The payment processing pool.
    pub fn processing_pool(&self) -> &Arc<WorkerPool> {
        &self.processing_pool
    }

    /// The pool shared by webhooks and async sinks.
    pub fn webhook_pool(&self) -> &Arc<WorkerPool> {
        &self.webhook_pool
    }

    /// Stops accepting work and drains both pools, payments first.
    pub async fn shutdown(&self, timeout: std::time::Duration) -> Result<()> {
        let payments = self.processing_pool.shutdown(timeout).await;
        let webhooks = self.webhook_pool.shutdown(timeout).await;

        if let Err(e) = &payments {
            warn!(error = %e, "payment pool did not drain");
        }
        if let Err(e) = &webhooks {
            warn!(error = %e, "webhook pool did not drain");
        }

        payments.context("payment pool shutdown")?;
        webhooks.context("webhook pool shutdown")?;
        Ok(())
    }
}
