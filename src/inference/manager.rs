use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use super::config::{ModelConfig, Quantization};
use super::types::{GenerateRequest, LlmClient};
use super::{InferenceError, ModelError};

const OUT_OF_MEMORY_MARKER: &str = "requires more system memory";
const WARM_UP_PROMPT: &str = "Reply with OK.";

/// Snapshot of the configured model for `GET /api/model`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub quantization: Quantization,
    pub loaded: bool,
    /// Resident bytes reported by `/api/ps`, when the model is in memory.
    pub resident_bytes: Option<u64>,
    pub vram_bytes: Option<u64>,
    pub context_length: u32,
}

/// Owns the lifecycle of the one configured model. Loads are serialized and
/// happen at most once per process.
pub struct ModelManager {
    client: Arc<dyn LlmClient>,
    config: ModelConfig,
    loaded: AtomicBool,
    load_lock: Mutex<()>,
}

impl ModelManager {
    pub fn new(client: Arc<dyn LlmClient>, config: ModelConfig) -> Self {
        Self {
            client,
            config,
            loaded: AtomicBool::new(false),
            load_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Verify the model is installed and warm it up.
    pub async fn load(&self) -> Result<(), ModelError> {
        let _guard = self.load_lock.lock().await;
        if self.is_loaded() {
            return Ok(());
        }

        let tag = self.config.ollama_tag();
        tracing::info!(model = %tag, quantization = %self.config.quantization, "Loading model");

        let installed = self
            .client
            .list_models()
            .await
            .map_err(|e| ModelError::ModelLoad {
                model: tag.clone(),
                reason: e.to_string(),
            })?;
        if !installed.iter().any(|name| same_model(name, &tag)) {
            return Err(ModelError::ModelLoad {
                model: tag,
                reason: "model is not installed on the inference server".into(),
            });
        }

        let warm_up = GenerateRequest {
            model: tag.clone(),
            prompt: WARM_UP_PROMPT.into(),
            system: None,
            images: Vec::new(),
            options: Some(super::GenerationOptions {
                num_predict: 10,
                ..self.config.options()
            }),
        };
        match self.client.generate(warm_up).await {
            Ok(_) => {}
            Err(InferenceError::Status { body, .. }) if body.contains(OUT_OF_MEMORY_MARKER) => {
                tracing::error!(model = %tag, "Not enough memory to load model");
                return Err(ModelError::InsufficientMemory {
                    model: tag,
                    detail: body,
                });
            }
            Err(e) => {
                return Err(ModelError::ModelLoad {
                    model: tag,
                    reason: e.to_string(),
                })
            }
        }

        self.loaded.store(true, Ordering::Release);
        tracing::info!(model = %tag, "Model loaded");
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    pub async fn info(&self) -> ModelInfo {
        let tag = self.config.ollama_tag();
        let resident = match self.client.running_models().await {
            Ok(models) => models.into_iter().find(|m| same_model(&m.name, &tag)),
            Err(e) => {
                tracing::debug!(error = %e, "Could not query running models");
                None
            }
        };

        ModelInfo {
            loaded: self.is_loaded(),
            resident_bytes: resident.as_ref().map(|m| m.size),
            vram_bytes: resident.as_ref().map(|m| m.size_vram),
            name: tag,
            quantization: self.config.quantization,
            context_length: self.config.context_length,
        }
    }
}

/// Ollama reports untagged pulls as `name:latest`.
fn same_model(available: &str, wanted: &str) -> bool {
    available == wanted || available.strip_suffix(":latest") == Some(wanted)
}
