//! `GET /api/model` — status of the configured model.

use axum::extract::State;
use axum::Json;

use crate::api::types::ApiContext;
use crate::inference::ModelInfo;

pub async fn info(State(ctx): State<ApiContext>) -> Json<ModelInfo> {
    Json(ctx.models.info().await)
}
