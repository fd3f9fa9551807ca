use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::types::*;
use super::InferenceError;

/// Async Ollama HTTP client.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    /// `bearer_token` is attached to every request when the inference host
    /// sits behind an authenticating proxy.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        bearer_token: Option<&str>,
    ) -> Result<Self, InferenceError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(token) = bearer_token {
            let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| InferenceError::HttpClient("HF_TOKEN is not a valid header value".into()))?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| InferenceError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs: timeout.as_secs(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_send_error(&self, e: reqwest::Error) -> InferenceError {
        if e.is_connect() {
            InferenceError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            InferenceError::Timeout(self.timeout_secs)
        } else {
            InferenceError::HttpClient(e.to_string())
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, InferenceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let raw = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<OllamaErrorBody>(&raw)
            .map(|b| b.error)
            .unwrap_or(raw);
        Err(InferenceError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, InferenceError>
    where
        B: serde::Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| InferenceError::ResponseParsing(e.to_string()))
    }

    async fn get_json<R>(&self, path: &str) -> Result<R, InferenceError>
    where
        R: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| InferenceError::ResponseParsing(e.to_string()))
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, request: GenerateRequest) -> Result<String, InferenceError> {
        if request.images.is_empty() {
            let body = OllamaGenerateRequest {
                model: &request.model,
                prompt: &request.prompt,
                system: request.system.as_deref(),
                stream: false,
                options: request.options.as_ref(),
            };
            let parsed: OllamaGenerateResponse = self.post_json("/api/generate", &body).await?;
            return Ok(parsed.response);
        }

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref() {
            messages.push(OllamaChatMessage {
                role: "system",
                content: system,
                images: None,
            });
        }
        messages.push(OllamaChatMessage {
            role: "user",
            content: &request.prompt,
            images: Some(&request.images),
        });
        let body = OllamaChatRequest {
            model: &request.model,
            messages,
            stream: false,
            options: request.options.as_ref(),
        };
        let parsed: OllamaChatResponse = self.post_json("/api/chat", &body).await?;
        Ok(parsed.message.content)
    }

    async fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        let parsed: OllamaTagsResponse = self.get_json("/api/tags").await?;
        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }

    async fn running_models(&self) -> Result<Vec<RunningModel>, InferenceError> {
        let parsed: OllamaPsResponse = self.get_json("/api/ps").await?;
        Ok(parsed.models)
    }
}

/// Mock LLM client for testing: returns a configurable response.
pub struct MockLlmClient {
    response: Result<String, InferenceError>,
    available_models: Vec<String>,
    running: Vec<RunningModel>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
            available_models: vec!["medgemma:7b-q4_k_m".to_string()],
            running: Vec::new(),
            delay: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every generation fails with `error`.
    pub fn failing(error: InferenceError) -> Self {
        Self {
            response: Err(error),
            ..Self::new("")
        }
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.available_models = models;
        self
    }

    pub fn with_running(mut self, running: Vec<RunningModel>) -> Self {
        self.running = running;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate(&self, request: GenerateRequest) -> Result<String, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.response.clone()
    }

    async fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        Ok(self.available_models.clone())
    }

    async fn running_models(&self) -> Result<Vec<RunningModel>, InferenceError> {
        Ok(self.running.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    /// Minimal stand-in for an Ollama server on an ephemeral port.
    async fn spawn_fake_ollama() -> String {
        let app = Router::new()
            .route(
                "/api/generate",
                post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                    if body["model"] == "too-big" {
                        return (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            Json(json!({"error": "model requires more system memory (12 GiB) than is available"})),
                        );
                    }
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("none")
                        .to_string();
                    let reply = format!(
                        "generate:{}|system:{}|auth:{}|predict:{}",
                        body["prompt"].as_str().unwrap_or(""),
                        body["system"].as_str().unwrap_or("-"),
                        auth,
                        body["options"]["num_predict"]
                    );
                    (StatusCode::OK, Json(json!({"response": reply, "done": true})))
                }),
            )
            .route(
                "/api/chat",
                post(|Json(body): Json<Value>| async move {
                    let messages = body["messages"].as_array().cloned().unwrap_or_default();
                    let user = messages.last().cloned().unwrap_or_default();
                    let images = user["images"].as_array().map(|a| a.len()).unwrap_or(0);
                    Json(json!({
                        "message": {
                            "role": "assistant",
                            "content": format!("chat:{}|messages:{}|images:{}", user["content"].as_str().unwrap_or(""), messages.len(), images)
                        },
                        "done": true
                    }))
                }),
            )
            .route(
                "/api/tags",
                get(|| async {
                    Json(json!({"models": [{"name": "medgemma:7b-q4_k_m", "size": 1}, {"name": "llama3:8b"}]}))
                }),
            )
            .route(
                "/api/ps",
                get(|| async {
                    Json(json!({"models": [{"name": "medgemma:7b-q4_k_m", "size": 5000, "size_vram": 4000}]}))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(base: &str, token: Option<&str>) -> OllamaClient {
        OllamaClient::new(base, Duration::from_secs(5), token).unwrap()
    }

    #[tokio::test]
    async fn generate_uses_generate_endpoint() {
        let base = spawn_fake_ollama().await;
        let client = client(&base, None);
        let text = client
            .generate(GenerateRequest {
                model: "medgemma:7b-q4_k_m".into(),
                prompt: "hello".into(),
                system: Some("be brief".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(text.starts_with("generate:hello|system:be brief|auth:none"));
    }

    #[tokio::test]
    async fn options_are_forwarded() {
        let base = spawn_fake_ollama().await;
        let text = client(&base, None)
            .generate(GenerateRequest {
                model: "m".into(),
                prompt: "p".into(),
                options: Some(crate::inference::GenerationOptions::default()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(text.ends_with("predict:512"));
    }

    #[tokio::test]
    async fn bearer_token_is_sent() {
        let base = spawn_fake_ollama().await;
        let text = client(&base, Some("hf_secret"))
            .generate(GenerateRequest {
                model: "m".into(),
                prompt: "p".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(text.contains("auth:Bearer hf_secret"));
    }

    #[tokio::test]
    async fn images_route_through_chat() {
        let base = spawn_fake_ollama().await;
        let text = client(&base, None)
            .generate(GenerateRequest {
                model: "m".into(),
                prompt: "describe".into(),
                system: Some("sys".into()),
                images: vec!["aGVsbG8=".into()],
                options: None,
            })
            .await
            .unwrap();
        assert_eq!(text, "chat:describe|messages:2|images:1");
    }

    #[tokio::test]
    async fn error_body_is_unwrapped() {
        let base = spawn_fake_ollama().await;
        let err = client(&base, None)
            .generate(GenerateRequest {
                model: "too-big".into(),
                prompt: "p".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        match err {
            InferenceError::Status { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("requires more system memory"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn lists_installed_and_running_models() {
        let base = spawn_fake_ollama().await;
        let client = client(&base, None);
        let models = client.list_models().await.unwrap();
        assert_eq!(models, vec!["medgemma:7b-q4_k_m", "llama3:8b"]);

        let running = client.running_models().await.unwrap();
        assert_eq!(running[0].size_vram, 4000);
    }

    #[tokio::test]
    async fn unreachable_server_is_connection_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(&format!("http://{addr}"), None)
            .list_models()
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::Connection(_)));
    }

    #[test]
    fn trims_trailing_slash() {
        let client = client("http://localhost:11434/", None);
        assert_eq!(client.base_url(), "http://localhost:11434");
    }

    #[tokio::test]
    async fn mock_records_requests() {
        let mock = MockLlmClient::new("ok");
        let out = mock
            .generate(GenerateRequest {
                prompt: "x".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(out, "ok");
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.requests()[0].prompt, "x");
    }
}
