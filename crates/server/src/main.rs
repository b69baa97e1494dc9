mod api;
mod bootstrap;
mod health;
mod services;
mod telemetry;

use std::time::Duration;

use anyhow::{Context, Result};
use milletchain_core::config::{AppConfig, LoadOptions};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging needs the config, so it is loaded before anything else.
    let config = AppConfig::load(LoadOptions::default())?;
    telemetry::init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "milletchain-server listening"
    );

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let serve = axum::serve(listener, app.router()).with_graceful_shutdown(wait_for_shutdown());
    serve.await.context("http server terminated unexpectedly")?;

    info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "milletchain-server stopping"
    );
    if tokio::time::timeout(grace, app.db_pool.close()).await.is_err() {
        warn!(
            event_name = "system.server.pool_close_timeout",
            correlation_id = "shutdown",
            grace_secs = grace.as_secs(),
            "database pool did not close within the grace period"
        );
    }

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "failed to listen for ctrl-c; shutting down"
        );
    }
}
