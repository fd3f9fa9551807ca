//! `GET /api/audit` — compliance query over the audit log.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuditQuery};
use crate::db::{query_audit_log, AuditFilter};
use crate::models::{AuditAction, AuditLogEntry};

#[derive(Debug, Serialize)]
pub struct AuditResponse {
    pub count: usize,
    pub entries: Vec<AuditEntryView>,
}

/// An audit row as served over HTTP. Client addresses stay in the database.
#[derive(Debug, Serialize)]
pub struct AuditEntryView {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    pub resource: Option<String>,
    pub details: Option<String>,
}

impl From<AuditLogEntry> for AuditEntryView {
    fn from(entry: AuditLogEntry) -> Self {
        Self {
            id: entry.id,
            timestamp: entry.timestamp,
            actor: entry.actor,
            action: entry.action,
            resource: entry.resource,
            details: entry.details,
        }
    }
}

/// Newest first. `limit` defaults to 100 and is capped at 1000.
pub async fn query(
    State(ctx): State<ApiContext>,
    params: Result<Query<AuditQuery>, QueryRejection>,
) -> Result<Json<AuditResponse>, ApiError> {
    let Query(params) = params?;

    if let Some(action) = params.action.as_deref() {
        if AuditAction::from_str(action).is_none() {
            return Err(ApiError::BadRequest(format!("Unknown audit action: {action}")));
        }
    }

    let filter = AuditFilter {
        actor: params.actor,
        action: params.action,
        since: None,
        limit: params.limit,
    };
    let entries: Vec<AuditEntryView> = ctx
        .with_db(|conn| query_audit_log(conn, &filter))?
        .into_iter()
        .map(AuditEntryView::from)
        .collect();

    Ok(Json(AuditResponse {
        count: entries.len(),
        entries,
    }))
}
