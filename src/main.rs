//! Paysink payment notification service.
//!
//! Main entry point. Loads configuration, wires all subsystems and
//! coordinates graceful startup and shutdown.

use std::sync::Arc;

use anyhow::{Context, Result};
use paysink::{App, Config};
use paysink_core::RealClock;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    init_tracing(&config.log)?;

    info!("Starting paysink payment notification service");
    info!(
        payment_workers = config.payment_workers,
        webhook_workers = config.webhook_workers,
        max_delivery_attempts = config.max_delivery_attempts,
        failure_rate = config.failure_rate,
        "Configuration loaded"
    );

    let app = App::build(&config, Arc::new(RealClock::new()))?;

    match app.delivery.resume_pending().await {
        Ok(0) => {},
        Ok(resumed) => info!(resumed, "Pending webhook deliveries resumed"),
        Err(e) => warn!(error = %e, "Could not resume pending webhook deliveries"),
    }

    info!("paysink is ready");

    shutdown_signal().await?;
    info!("Shutdown signal received, draining worker pools");

    app.shutdown(config.shutdown_timeout()).await?;

    let stats = app.delivery.stats();
    info!(
        webhooks_scheduled = stats.scheduled,
        webhooks_succeeded = stats.succeeded,
        webhooks_exhausted = stats.exhausted,
        events = app.sinks.metrics.counters().total(),
        "paysink shutdown complete"
    );
    Ok(())
}

/// Initializes tracing with environment-based configuration.
fn init_tracing(default_filter: &str) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .context("Invalid log filter")?;

    let fmt_layer = fmt::layer().with_target(true).with_thread_ids(true).with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
    Ok(())
}

/// Waits for shutdown signal (CTRL+C or SIGTERM).
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .context("failed to install SIGTERM handler")?;

        tokio::select! {
            result = ctrl_c => {
                result.context("failed to listen for Ctrl+C")?;
                info!("Received CTRL+C signal");
            },
            _ = terminate.recv() => {
                info!("Received SIGTERM signal");
            },
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.context("failed to listen for Ctrl+C")?;
        info!("Received CTRL+C signal");
    }

    Ok(())
}
