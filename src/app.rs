use crate::domain::error::{AppError, Result};
use crate::infrastructure::bootstrap::build_state;
use crate::infrastructure::config::AppConfig;
use crate::interfaces::http::{add_log, start_server};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Loads configuration, prepares the database and serves until shutdown.
pub async fn run() -> Result<()> {
    let config = AppConfig::load()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let logs = Arc::new(Mutex::new(Vec::new()));
    let state = build_state(&config, &logs).await?;

    let server = start_server(
        state,
        logs.clone(),
        &config.server.host,
        config.server.port,
    )
    .map_err(|e| AppError::IoError(format!("Failed to bind {}: {}", config.bind_address(), e)))?;

    tracing::info!("Listening on http://{}", config.bind_address());
    add_log(
        &logs,
        "INFO",
        "Server",
        &format!("Listening on {}", config.bind_address()),
    );

    server.await?;
    tracing::info!("Server stopped");
    Ok(())
}
