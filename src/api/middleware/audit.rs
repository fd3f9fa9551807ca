//! Audit logging middleware.
//!
//! Appends one row to `audit_log` for every audited route after the
//! handler has produced its response. Rows carry route, client address and
//! status code only; request bodies are never recorded.

use axum::http::{Method, Request};
use axum::middleware::Next;
use axum::response::Response;

use crate::api::middleware::rate::client_ip;
use crate::api::types::ApiContext;
use crate::db::insert_audit_event;
use crate::models::{AuditAction, NewAuditEvent, ANONYMOUS_ACTOR};

/// Audited action for a request, if the route is audited.
pub fn action_for(method: &Method, path: &str) -> Option<AuditAction> {
    match (method, path) {
        (&Method::POST, "/api/triage") => Some(AuditAction::TriageMultimodal),
        (&Method::POST, "/triage") => Some(AuditAction::TriageLegacy),
        (&Method::POST, "/api/generate-note") => Some(AuditAction::GenerateSoap),
        (&Method::GET, "/api/audit") => Some(AuditAction::AuditQuery),
        (&Method::GET, "/api/model") => Some(AuditAction::ModelInfo),
        _ => None,
    }
}

/// Record API access for the audit trail.
/// Accesses `ApiContext` from request extensions.
pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let action = action_for(req.method(), &path);
    let ip = client_ip(&req);
    let ctx = req.extensions().get::<ApiContext>().cloned();

    let response = next.run(req).await;

    if let (Some(action), Some(ctx)) = (action, ctx) {
        let status = response.status().as_u16();
        let event = NewAuditEvent::new(ANONYMOUS_ACTOR, action)
            .resource(path)
            .ip_address(ip)
            .details(format!("status:{status}"));

        let written = ctx.with_db(|conn| insert_audit_event(conn, &event, chrono::Utc::now()));
        match written {
            Ok(id) => tracing::debug!(audit_id = id, action = action.as_str(), status, "Audit event recorded"),
            Err(e) => tracing::error!(error = %e, action = action.as_str(), "Failed to write audit event"),
        }
    }

    response
}
