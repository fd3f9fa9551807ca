use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::config::ModelConfig;
use super::types::{GenerateRequest, LlmClient};
use super::{InferenceError, ModelError};

#[derive(Debug, Clone)]
pub struct BatcherConfig {
    /// Upper bound on prompts dispatched together.
    pub batch_size: usize,
    /// How long the worker keeps collecting after the first prompt arrives.
    pub wait_time: Duration,
    pub queue_capacity: usize,
    /// How long `submit` waits for a free queue slot.
    pub enqueue_timeout: Duration,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            wait_time: Duration::from_millis(100),
            queue_capacity: 256,
            enqueue_timeout: Duration::from_secs(2),
        }
    }
}

struct QueuedPrompt {
    prompt: String,
    system: Option<String>,
    images: Vec<String>,
    respond_to: oneshot::Sender<Result<String, InferenceError>>,
}

/// Groups concurrently submitted prompts and dispatches each group to the
/// inference server in parallel.
///
/// One background worker owns the receiving end of a bounded queue. Each
/// caller gets its own result regardless of how its batch-mates fared.
pub struct MicroBatcher {
    sender: mpsc::Sender<QueuedPrompt>,
    worker: JoinHandle<()>,
    batches: Arc<AtomicU64>,
    enqueue_timeout: Duration,
}

impl MicroBatcher {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(client: Arc<dyn LlmClient>, model: ModelConfig, config: BatcherConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let batches = Arc::new(AtomicU64::new(0));
        let enqueue_timeout = config.enqueue_timeout;
        let worker = tokio::spawn(run_worker(
            receiver,
            client,
            model,
            config,
            Arc::clone(&batches),
        ));

        Self {
            sender,
            worker,
            batches,
            enqueue_timeout,
        }
    }

    pub async fn submit(&self, prompt: &str, system: Option<&str>) -> Result<String, ModelError> {
        self.submit_with_images(prompt, system, Vec::new()).await
    }

    pub async fn submit_with_images(
        &self,
        prompt: &str,
        system: Option<&str>,
        images: Vec<String>,
    ) -> Result<String, ModelError> {
        if prompt.trim().is_empty() {
            return Err(ModelError::InvalidInput("prompt is empty".into()));
        }

        let (respond_to, response) = oneshot::channel();
        let item = QueuedPrompt {
            prompt: prompt.to_string(),
            system: system.map(str::to_string),
            images,
            respond_to,
        };

        self.sender
            .send_timeout(item, self.enqueue_timeout)
            .await
            .map_err(|e| match e {
                mpsc::error::SendTimeoutError::Timeout(_) => {
                    tracing::warn!("Inference queue full, rejecting prompt");
                    InferenceError::QueueFull
                }
                mpsc::error::SendTimeoutError::Closed(_) => InferenceError::WorkerStopped,
            })?;

        let result = response.await.map_err(|_| InferenceError::WorkerStopped)?;
        Ok(result?)
    }

    /// Batches dispatched since startup.
    pub fn batches_dispatched(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    /// Stop the worker. Queued and later submissions fail with `WorkerStopped`.
    pub fn shutdown(&self) {
        self.worker.abort();
    }
}

impl Drop for MicroBatcher {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<QueuedPrompt>,
    client: Arc<dyn LlmClient>,
    model: ModelConfig,
    config: BatcherConfig,
    batches: Arc<AtomicU64>,
) {
    let model_tag = model.ollama_tag();
    let options = model.options();

    while let Some(first) = receiver.recv().await {
        let mut batch = vec![first];
        let deadline = Instant::now() + config.wait_time;

        while batch.len() < config.batch_size {
            match tokio::time::timeout_at(deadline, receiver.recv()).await {
                Ok(Some(item)) => batch.push(item),
                Ok(None) | Err(_) => break,
            }
        }

        batches.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(batch_size = batch.len(), "Dispatching inference batch");

        let dispatches = batch.into_iter().map(|item| {
            let client = Arc::clone(&client);
            let request = GenerateRequest {
                model: model_tag.clone(),
                prompt: item.prompt,
                system: item.system,
                images: item.images,
                options: Some(options.clone()),
            };
            async move {
                let result = client.generate(request).await;
                if let Err(e) = &result {
                    tracing::warn!(error = %e, "Inference request failed");
                }
                // Receiver gone means the caller stopped waiting.
                let _ = item.respond_to.send(result);
            }
        });
        join_all(dispatches).await;
    }

    tracing::info!("Inference queue closed, batch worker exiting");
}
