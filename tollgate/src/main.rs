//! Tollgate Web Server - Signed webhook receiver.
//!
//! This binary:
//! - Receives provider webhooks on `POST /api/webhooks`
//! - Verifies the HMAC signature over the raw body
//! - Records the event id and returns 200 right away
//! - Runs the registered handler in the background
//!
//! On shutdown it stops accepting requests, then waits (bounded) for handlers
//! that are still running.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tollgate::handlers::PaymentLogger;
use tollgate::shutdown::shutdown_signal;
use tollgate::{router, AppState, Config, Dispatcher, EventKind, HandlerRegistry, MemoryLedger};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        webhook_secret_configured = config.is_webhook_configured(),
        signature_header = %config.signature_header,
        max_body_bytes = config.max_body_bytes,
        dedup_retention_secs = config.dedup_retention.as_secs(),
        shutdown_timeout_secs = config.shutdown_timeout.as_secs(),
        "config_loaded"
    );

    if !config.is_webhook_configured() {
        error!("WHOP_WEBHOOK_SECRET not set; webhook endpoint will answer 503");
    }

    let registry =
        HandlerRegistry::new().register(EventKind::PaymentSucceeded, Arc::new(PaymentLogger));
    info!(
        kinds = ?registry.kinds().map(|k| k.as_str()).collect::<Vec<_>>(),
        "handlers_registered"
    );

    let ledger = Arc::new(MemoryLedger::new());
    let dispatcher = Dispatcher::from_config(&config, registry, ledger.clone());

    let shutdown = CancellationToken::new();

    // Purge old event ids in the background
    let sweeper = {
        let ledger = Arc::clone(&ledger);
        let token = shutdown.clone();
        let retention = config.dedup_retention;
        let interval = config.dedup_sweep_interval;
        tokio::spawn(async move { ledger.run_sweeper(retention, interval, token).await })
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let shutdown_timeout = config.shutdown_timeout;
    let app = router(AppState::new(config, dispatcher.clone()));

    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .context("Server error")?;

    // Make sure background loops see the shutdown even if serve exited on its own
    shutdown.cancel();

    if !dispatcher.drain(shutdown_timeout).await {
        warn!("web_server_abandoned_handlers");
    }

    if let Err(e) = sweeper.await {
        warn!(error = %e, "ledger_sweeper_join_failed");
    }

    info!("web_server_shutdown_complete");

    Ok(())
}
