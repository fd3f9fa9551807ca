//! Local model inference: the Ollama client, the micro-batching queue in
//! front of it, and the model lifecycle manager.

pub mod batcher;
pub mod config;
pub mod manager;
pub mod ollama;
pub mod types;

pub use batcher::*;
pub use config::*;
pub use manager::*;
pub use ollama::*;
pub use types::*;

use thiserror::Error;

/// Failures talking to the inference server or reaching the batch worker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InferenceError {
    #[error("Inference server is not reachable at {0}")]
    Connection(String),

    #[error("Inference server returned an error (HTTP {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Inference request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Failed to parse inference response: {0}")]
    ResponseParsing(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Inference queue is full")]
    QueueFull,

    #[error("Inference worker has stopped")]
    WorkerStopped,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Failed to load model '{model}': {reason}")]
    ModelLoad { model: String, reason: String },

    #[error("Insufficient memory to load model '{model}': {detail}")]
    InsufficientMemory { model: String, detail: String },

    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("Invalid model input: {0}")]
    InvalidInput(String),
}
