//! Key Service - Main Entry Point

use std::env;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use key_service::observability::{init_tracing, TracingConfig};
use key_service::{Config, KeyService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("failed to load configuration")?;

    let tracing_config = TracingConfig::for_run_mode(config.run_mode, |name| env::var(name).ok());
    init_tracing(&tracing_config).context("failed to initialize tracing")?;

    info!(
        service = %tracing_config.service_name,
        run_mode = ?config.run_mode,
        storage_backend = ?config.storage.backend,
        "Starting Key Service"
    );

    let service = KeyService::from_config(&config)
        .await
        .context("failed to initialize key storage")?;

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    service.serve(listener).await.context("server error")?;

    Ok(())
}
