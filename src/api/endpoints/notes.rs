//! `POST /api/generate-note` — SOAP note plus every export format.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::Json;

use crate::api::cache::{ResponseCache, NOTE_TTL};
use crate::api::endpoints::cached_json;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, NoteRequest};

pub async fn generate(
    State(ctx): State<ApiContext>,
    payload: Result<Json<NoteRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let canonical = serde_json::to_vec(&request).map_err(|e| ApiError::Internal(e.to_string()))?;
    let key = ResponseCache::key_for("/api/generate-note", &canonical);

    cached_json(&ctx.cache, &key, NOTE_TTL, async {
        let context = request.context_value();
        let bundle = ctx
            .documentation
            .generate_note(&request.encounter_text, &context, &request.encounter_type)
            .await;
        Ok(bundle)
    })
    .await
}
