//! API server lifecycle: wire services from config, bind, serve, and run the
//! retention sweep alongside.
//!
//! Pattern: bind → spawn background task → return handle with shutdown channel.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::api::cache::ResponseCache;
use crate::api::error::ApiError;
use crate::api::router::build_router;
use crate::api::types::ApiContext;
use crate::config::{AppConfig, ConfigError};
use crate::crypto::{FieldCipher, FieldKey, KeySource};
use crate::db::{insert_audit_event, open_location, purge_patients_before, DatabaseError};
use crate::documentation::DocumentationService;
use crate::inference::{
    BatcherConfig, InferenceError, LlmClient, MicroBatcher, ModelConfig, ModelManager,
    OllamaClient,
};
use crate::models::{AuditAction, NewAuditEvent};

/// How often expired patient records are purged.
pub const RETENTION_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Inference client setup failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
}

/// Everything the router needs, plus the batcher handle for shutdown.
pub struct AppServices {
    pub ctx: ApiContext,
    pub batcher: Arc<MicroBatcher>,
}

/// Build services from configuration. Does not contact the model host.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, ServerError> {
    let (key, source) = FieldKey::from_optional(config.encryption_key.as_deref());
    match source {
        KeySource::Ephemeral => tracing::warn!(
            "ENCRYPTION_KEY not set; using an ephemeral key. Encrypted data will be unreadable after restart"
        ),
        KeySource::Raw => tracing::info!("Field encryption key loaded"),
        KeySource::Passphrase => tracing::info!("Field encryption key derived from passphrase"),
    }
    let cipher = Arc::new(FieldCipher::new(key));

    let location = config.database_location()?;
    let conn = open_location(&location)?;
    tracing::info!(?location, "Database ready");

    let model_config = ModelConfig::new(&config.model_name, config.quantization);
    let client: Arc<dyn LlmClient> = Arc::new(OllamaClient::new(
        &config.ollama_host,
        model_config.request_timeout,
        config.hf_token.as_deref(),
    )?);

    let batcher = Arc::new(MicroBatcher::spawn(
        Arc::clone(&client),
        model_config.clone(),
        BatcherConfig::default(),
    ));
    let models = Arc::new(ModelManager::new(client, model_config));
    let documentation = Arc::new(DocumentationService::new(
        Arc::clone(&batcher),
        Arc::clone(&models),
    ));

    let cache = ResponseCache::connect(config.redis_url.as_deref(), Arc::clone(&cipher)).await;
    tracing::info!(backend = cache.backend_name(), "Response cache ready");

    Ok(AppServices {
        ctx: ApiContext::new(documentation, models, conn, cipher, cache),
        batcher,
    })
}

/// Handle to a running API server.
pub struct ApiServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ApiServer {
    /// Signal graceful shutdown. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
    }

    /// Wait until the server task has exited.
    pub async fn stopped(self) {
        let _ = self.task.await;
    }
}

/// Bind `addr` and serve the router in a background task.
pub async fn start_server(ctx: ApiContext, addr: SocketAddr) -> Result<ApiServer, ServerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    let addr = listener
        .local_addr()
        .map_err(|source| ServerError::Bind { addr, source })?;

    let app = build_router(ctx);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("API server received shutdown signal");
        };

        tracing::info!(%addr, "API server started");

        if let Err(e) = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal)
        .await
        {
            tracing::error!("API server error: {e}");
        }

        tracing::info!("API server stopped");
    });

    Ok(ApiServer {
        addr,
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}

/// Load the model in the background so startup never blocks on Ollama.
pub fn spawn_model_warmup(models: Arc<ModelManager>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match models.load().await {
            Ok(()) => tracing::info!(model = %models.config().ollama_tag(), "Model ready"),
            Err(e) => tracing::warn!(error = %e, "Model load failed; notes will use fallback templates"),
        }
    })
}

/// Delete patient records older than `retention_days` and audit the purge.
pub fn purge_expired(ctx: &ApiContext, retention_days: i64) -> Result<usize, ApiError> {
    let now = Utc::now();
    let cutoff = now - chrono::Duration::days(retention_days);
    ctx.with_db(|conn| {
        let purged = purge_patients_before(conn, cutoff)?;
        let event = NewAuditEvent::new("system", AuditAction::RetentionPurge)
            .resource("patients")
            .details(format!("purged:{purged}"));
        insert_audit_event(conn, &event, now)?;
        Ok(purged)
    })
}

/// Run `purge_expired` every `interval`, starting immediately.
pub fn spawn_retention_task(
    ctx: ApiContext,
    retention_days: i64,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match purge_expired(&ctx, retention_days) {
                Ok(purged) => tracing::info!(purged, retention_days, "Retention sweep complete"),
                Err(e) => tracing::error!(error = %e, "Retention sweep failed"),
            }
        }
    })
}
