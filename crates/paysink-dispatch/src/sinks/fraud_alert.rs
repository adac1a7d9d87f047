use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use paysink_core::{Clock, EventKind, EventSink, SinkError, WebhookEvent};
use tracing::{info, warn};

use crate::descriptor::SinkDescriptor;

/// Simulated latency of the fraud team's alerting API.
pub const ALERT_LATENCY: Duration = Duration::from_millis(500);

/// Notifies the fraud team about declined payments.
#[derive(Debug, Clone)]
pub struct FraudAlertSink {
    clock: Arc<dyn Clock>,
    alerts_sent: Arc<AtomicU64>,
}

impl FraudAlertSink {
    /// Registered sink name.
    pub const NAME: &'static str = "fraud-alert";

    /// Creates the sink. `clock` drives the simulated alert latency.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, alerts_sent: Arc::new(AtomicU64::new(0)) }
    }

    /// Number of alerts sent so far.
    pub fn alerts_sent(&self) -> u64 {
        self.alerts_sent.load(Ordering::Relaxed)
    }

    /// Registration metadata: declines only, sync, priority 10, 15 s timeout.
    pub fn descriptor() -> SinkDescriptor {
        SinkDescriptor::new(Self::NAME, [EventKind::PaymentDeclined])
            .sync()
            .with_priority(10)
            .with_timeout(Duration::from_secs(15))
    }
}

#[async_trait]
impl EventSink for FraudAlertSink {
    async fn handle(&self, event: WebhookEvent) -> Result<(), SinkError> {
        warn!(
            payment_id = %event.payment_id,
            merchant_id = %event.merchant_id,
            "fraud alert: payment declined"
        );

        self.clock.sleep(ALERT_LATENCY).await;
        self.alerts_sent.fetch_add(1, Ordering::Relaxed);

        info!(payment_id = %event.payment_id, "alert sent to fraud team");
        Ok(())
    }
}
