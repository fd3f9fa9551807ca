use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::config::GenerationOptions;
use super::InferenceError;

/// One completion request, independent of which Ollama endpoint serves it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub system: Option<String>,
    /// Base64-encoded PNG/JPEG images.
    pub images: Vec<String>,
    pub options: Option<GenerationOptions>,
}

/// A model currently resident on the server (`/api/ps`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningModel {
    pub name: String,
    /// Total resident bytes.
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub size_vram: u64,
}

/// Inference backend abstraction (allows mocking).
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<String, InferenceError>;

    async fn list_models(&self) -> Result<Vec<String>, InferenceError>;

    async fn running_models(&self) -> Result<Vec<RunningModel>, InferenceError>;
}

// Ollama wire types

#[derive(Debug, Serialize)]
pub(crate) struct OllamaGenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<&'a str>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<&'a GenerationOptions>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OllamaGenerateResponse {
    #[serde(default)]
    pub response: String,
}

/// Chat-template models only accept images through `/api/chat`.
#[derive(Debug, Serialize)]
pub(crate) struct OllamaChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<OllamaChatMessage<'a>>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<&'a GenerationOptions>,
}

#[derive(Debug, Serialize)]
pub(crate) struct OllamaChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<&'a [String]>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OllamaChatResponse {
    pub message: OllamaChatResponseMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OllamaChatResponseMessage {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OllamaTagsResponse {
    #[serde(default)]
    pub models: Vec<OllamaTagModel>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OllamaTagModel {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OllamaPsResponse {
    #[serde(default)]
    pub models: Vec<RunningModel>,
}

/// Ollama error bodies look like `{"error": "..."}`.
#[derive(Debug, Deserialize)]
pub(crate) struct OllamaErrorBody {
    pub error: String,
}
