//! Per-client rate limiting for the model-backed routes and the audit query.
//!
//! - `POST /api/triage`, `POST /triage`: 5 requests per minute
//! - `POST /api/generate-note`: 10 requests per minute
//! - `GET /api/audit`: 30 requests per minute

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

pub const TRIAGE_PER_MINUTE: u32 = 5;
pub const NOTES_PER_MINUTE: u32 = 10;
pub const AUDIT_PER_MINUTE: u32 = 30;

/// Requests per minute allowed on `path`, or `None` when unlimited.
pub fn route_limit(path: &str) -> Option<u32> {
    match path {
        "/api/triage" | "/triage" => Some(TRIAGE_PER_MINUTE),
        "/api/generate-note" => Some(NOTES_PER_MINUTE),
        "/api/audit" => Some(AUDIT_PER_MINUTE),
        _ => None,
    }
}

/// Remote address of the peer, or `"unknown"` when the server was not
/// started with connect info (e.g. in-process tests).
pub fn client_ip<B>(req: &Request<B>) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Returns 429 when the client has exhausted the route's budget.
/// Accesses `ApiContext` from request extensions.
pub async fn limit(req: Request<axum::body::Body>, next: Next) -> Response {
    match limit_inner(req, next).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn limit_inner(req: Request<axum::body::Body>, next: Next) -> Result<Response, ApiError> {
    let path = req.uri().path().to_string();
    let Some(per_minute) = route_limit(&path) else {
        return Ok(next.run(req).await);
    };

    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let key = format!("{}|{path}", client_ip(&req));

    // MutexGuard is !Send, must drop before .await via block scope
    {
        let mut limiter = ctx
            .rate_limiter
            .lock()
            .map_err(|_| ApiError::Internal("rate limiter lock".into()))?;

        limiter.check(&key, per_minute).map_err(|retry_after| {
            tracing::warn!(%path, retry_after, "Rate limit exceeded");
            ApiError::RateLimited { retry_after }
        })?;
    }

    Ok(next.run(req).await)
}
