//! Triage endpoints.
//!
//! `POST /api/triage` — flat response, cached for a minute.
//! `POST /triage` — older nested shape; converted to the same `Vitals`
//! and run through the same validation and classifier.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::Json;

use crate::api::cache::{ResponseCache, TRIAGE_TTL};
use crate::api::endpoints::cached_json;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, LegacyTriageRequest, LegacyTriageResponse, TriageRequest};
use crate::models::{TriageResult, Vitals};
use crate::triage::TriageService;

/// `POST /api/triage`
pub async fn assess(
    State(ctx): State<ApiContext>,
    payload: Result<Json<TriageRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let canonical = serde_json::to_vec(&request).map_err(|e| ApiError::Internal(e.to_string()))?;
    let key = ResponseCache::key_for("/api/triage", &canonical);

    cached_json(&ctx.cache, &key, TRIAGE_TTL, async {
        run_triage(
            Arc::clone(&ctx.triage),
            request.chief_complaint,
            request.vitals,
            request.image_base64,
        )
        .await
    })
    .await
}

/// `POST /triage`
pub async fn assess_legacy(
    State(ctx): State<ApiContext>,
    payload: Result<Json<LegacyTriageRequest>, JsonRejection>,
) -> Result<Json<LegacyTriageResponse>, ApiError> {
    let Json(request) = payload?;
    let vitals = Vitals::try_from(request.vitals)?;
    let result = run_triage(Arc::clone(&ctx.triage), request.text_input, vitals, request.image).await?;
    Ok(Json(LegacyTriageResponse::from(result)))
}

/// Image decoding is CPU-bound, so assessment runs on the blocking pool.
async fn run_triage(
    service: Arc<TriageService>,
    complaint: String,
    vitals: Vitals,
    image_base64: Option<String>,
) -> Result<TriageResult, ApiError> {
    let result = tokio::task::spawn_blocking(move || {
        service.assess(&complaint, &vitals, image_base64.as_deref())
    })
    .await
    .map_err(|e| ApiError::Internal(format!("triage task failed: {e}")))??;
    Ok(result)
}
