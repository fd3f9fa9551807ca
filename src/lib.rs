pub mod api;
pub mod config;
pub mod crypto;
pub mod db;
pub mod documentation; // SOAP drafting + export formats
pub mod inference; // Ollama client, batching queue, model lifecycle
pub mod models;
pub mod preprocess;
pub mod privacy; // De-identification
pub mod triage;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use api::server::{self, ServerError, RETENTION_INTERVAL};
use config::AppConfig;

/// Install the global tracing subscriber. `RUST_LOG` wins over the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Run the service until Ctrl-C.
pub async fn run(config: AppConfig) -> Result<(), ServerError> {
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let services = server::build_services(&config).await?;
    let warmup = server::spawn_model_warmup(Arc::clone(&services.ctx.models));
    let retention = server::spawn_retention_task(
        services.ctx.clone(),
        config.retention_days,
        RETENTION_INTERVAL,
    );

    let mut api = server::start_server(services.ctx, config.bind_addr).await?;
    tracing::info!(addr = %api.addr, "Listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }

    api.shutdown();
    api.stopped().await;
    retention.abort();
    warmup.abort();
    services.batcher.shutdown();
    tracing::info!("Shutdown complete");
    Ok(())
}
