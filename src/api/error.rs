//! API error types with FastAPI-compatible `{"detail": ...}` bodies.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::models::VitalsError;

/// Error response body. `detail` is a string, or a list of field issues for 422.
#[derive(Debug, Serialize)]
pub struct ErrorBody<T: Serialize> {
    pub detail: T,
}

/// One rejected request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Validation failed: {} issue(s)", .0.len())]
    Validation(Vec<FieldIssue>),
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64 },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Validation(vec![FieldIssue {
            field: field.into(),
            message: message.into(),
        }])
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = match self {
            ApiError::Validation(issues) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorBody { detail: issues }),
            )
                .into_response(),
            ApiError::RateLimited { retry_after } => {
                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(ErrorBody {
                        detail: format!("Rate limit exceeded. Retry after {retry_after}s"),
                    }),
                )
                    .into_response();
                if let Ok(val) = HeaderValue::from_str(&retry_after.to_string()) {
                    response.headers_mut().insert("Retry-After", val);
                }
                response
            }
            ApiError::NotFound(detail) => {
                (StatusCode::NOT_FOUND, Json(ErrorBody { detail })).into_response()
            }
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, Json(ErrorBody { detail })).into_response()
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail_chars = detail.len(), "API internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody { detail })).into_response()
            }
        };
        response
            .headers_mut()
            .insert("Cache-Control", HeaderValue::from_static("no-store"));
        response
    }
}

impl From<VitalsError> for ApiError {
    fn from(err: VitalsError) -> Self {
        ApiError::Validation(
            err.0
                .into_iter()
                .map(|v| FieldIssue {
                    field: format!("vitals.{}", v.field),
                    message: v.message,
                })
                .collect(),
        )
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation("body", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation("query", rejection.body_text())
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<crate::db::DatabaseError> for ApiError {
    fn from(err: crate::db::DatabaseError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
