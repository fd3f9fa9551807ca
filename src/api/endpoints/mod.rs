//! API endpoint handlers.

pub mod audit;
pub mod health;
pub mod model;
pub mod notes;
pub mod triage;

use std::future::Future;
use std::time::Duration;

use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::api::cache::ResponseCache;
use crate::api::error::ApiError;

/// Serve `key` from the cache, or run `compute` and cache its JSON for `ttl`.
/// Only successful responses are cached.
pub(crate) async fn cached_json<T, Fut>(
    cache: &ResponseCache,
    key: &str,
    ttl: Duration,
    compute: Fut,
) -> Result<Response, ApiError>
where
    T: Serialize,
    Fut: Future<Output = Result<T, ApiError>>,
{
    if let Some(body) = cache.get(key).await {
        tracing::debug!(body_bytes = body.len(), "Response cache hit");
        return Ok(json_response(body, "HIT"));
    }

    let value = compute.await?;
    let body = serde_json::to_string(&value).map_err(|e| ApiError::Internal(e.to_string()))?;
    cache.put(key, &body, ttl).await;
    Ok(json_response(body, "MISS"))
}

fn json_response(body: String, cache_status: &'static str) -> Response {
    let mut response = body.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert("X-Cache", HeaderValue::from_static(cache_status));
    response
}
