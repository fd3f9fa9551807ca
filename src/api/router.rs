//! HTTP router for the clinical suite.
//!
//! Middleware stack (outermost → innermost):
//! CORS → Trace → Extension(ApiContext) → Audit logger → Rate limiter → Handler

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::error::ApiError;
use crate::api::middleware;
use crate::api::types::ApiContext;

/// Request bodies carry base64 images up to 20 MB decoded.
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected outside the middleware).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn build_router(ctx: ApiContext) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/api/triage", post(endpoints::triage::assess))
        .route("/triage", post(endpoints::triage::assess_legacy))
        .route("/api/generate-note", post(endpoints::notes::generate))
        .route("/api/audit", get(endpoints::audit::query))
        .route("/api/model", get(endpoints::model::info))
        .fallback(not_found)
        .with_state(ctx.clone())
        // Middleware stack (innermost first, outermost last):
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        // Extension must wrap the middleware so it can extract ApiContext
        .layer(axum::Extension(ctx))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Not Found".into())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::api::cache::ResponseCache;
    use crate::crypto::{FieldCipher, FieldKey};
    use crate::db::open_memory_database;
    use crate::documentation::DocumentationService;
    use crate::inference::{
        BatcherConfig, LlmClient, MicroBatcher, MockLlmClient, ModelConfig, ModelManager,
        Quantization,
    };

    const NOTE_JSON: &str = r#"{"soap_note":{"subjective":"Cough for five days","objective":"Temp 100.4, lungs clear","assessment":"Viral bronchitis likely","plan":"Supportive care, fluids"},"icd10":["J20.9"],"cpt":["99283"],"handoff":"Stable for discharge","patient_handout":"You have a chest cold."}"#;

    pub(crate) fn test_context(client: MockLlmClient) -> ApiContext {
        let llm: Arc<dyn LlmClient> = Arc::new(client);
        let config = ModelConfig::new("medgemma:7b-q4_k_m", Quantization::FourBit);
        let batcher = Arc::new(MicroBatcher::spawn(
            Arc::clone(&llm),
            config.clone(),
            BatcherConfig::default(),
        ));
        let models = Arc::new(ModelManager::new(llm, config));
        let documentation = Arc::new(DocumentationService::new(batcher, Arc::clone(&models)));
        let cipher = Arc::new(FieldCipher::new(FieldKey::generate()));
        let cache = ResponseCache::in_memory(Arc::clone(&cipher));
        ApiContext::new(
            documentation,
            models,
            open_memory_database().unwrap(),
            cipher,
            cache,
        )
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn triage_body(complaint: &str, hr: i32, bp_sys: i32, spo2: i32) -> Value {
        json!({
            "chief_complaint": complaint,
            "vitals": {"hr": hr, "bp_sys": bp_sys, "bp_dia": 80, "spo2": spo2, "temp": 98.6, "rr": 16}
        })
    }

    #[tokio::test]
    async fn health_reports_service() {
        let app = build_router(test_context(MockLlmClient::new("{}")));
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"status": "healthy", "service": "ER Clinical Intelligence Suite"})
        );
    }

    #[tokio::test]
    async fn triage_hypoxia_is_esi_one() {
        let app = build_router(test_context(MockLlmClient::new("{}")));
        let response = app
            .oneshot(post_json("/api/triage", &triage_body("short of breath", 140, 160, 88)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["esi_level"], 1);
        assert!(json["reasoning"].as_str().unwrap().contains("SpO2 88%"));
        assert_eq!(json["follow_up_questions"].as_array().unwrap().len(), 3);
        assert!(json.get("patient_explanation").is_some());
    }

    #[tokio::test]
    async fn triage_benign_is_esi_three() {
        let app = build_router(test_context(MockLlmClient::new("{}")));
        let response = app
            .oneshot(post_json("/api/triage", &triage_body("stubbed toe", 70, 120, 99)))
            .await
            .unwrap();
        let json = json_body(response).await;
        assert_eq!(json["esi_level"], 3);
    }

    #[tokio::test]
    async fn triage_second_identical_request_is_cached() {
        let app = build_router(test_context(MockLlmClient::new("{}")));
        let body = triage_body("chest pain", 80, 120, 98);

        let first = app.clone().oneshot(post_json("/api/triage", &body)).await.unwrap();
        assert_eq!(first.headers().get("X-Cache").unwrap(), "MISS");
        let first_json = json_body(first).await;

        let second = app.oneshot(post_json("/api/triage", &body)).await.unwrap();
        assert_eq!(second.headers().get("X-Cache").unwrap(), "HIT");
        assert_eq!(json_body(second).await, first_json);
        assert_eq!(first_json["esi_level"], 2);
    }

    #[tokio::test]
    async fn triage_out_of_range_vitals_is_422() {
        let app = build_router(test_context(MockLlmClient::new("{}")));
        let response = app
            .oneshot(post_json("/api/triage", &triage_body("dizzy", 80, 120, 140)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = json_body(response).await;
        assert_eq!(json["detail"][0]["field"], "vitals.spo2");
    }

    #[tokio::test]
    async fn triage_missing_field_is_422() {
        let app = build_router(test_context(MockLlmClient::new("{}")));
        let response = app
            .oneshot(post_json("/api/triage", &json!({"chief_complaint": "dizzy"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = json_body(response).await;
        assert_eq!(json["detail"][0]["field"], "body");
    }

    #[tokio::test]
    async fn triage_rate_limited_after_five() {
        let app = build_router(test_context(MockLlmClient::new("{}")));
        for i in 0..5 {
            let response = app
                .clone()
                .oneshot(post_json("/api/triage", &triage_body(&format!("case {i}"), 80, 120, 98)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = app
            .oneshot(post_json("/api/triage", &triage_body("case 6", 80, 120, 98)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("Retry-After"));
    }

    #[tokio::test]
    async fn throttled_requests_are_audited() {
        let ctx = test_context(MockLlmClient::new("{}"));
        let app = build_router(ctx.clone());
        for i in 0..6 {
            app.clone()
                .oneshot(post_json("/api/triage", &triage_body(&format!("case {i}"), 80, 120, 98)))
                .await
                .unwrap();
        }
        let entries = ctx
            .with_db(|conn| crate::db::query_audit_log(conn, &crate::db::AuditFilter::default()))
            .unwrap();
        assert_eq!(entries.len(), 6);
        // Newest first
        assert_eq!(entries[0].details.as_deref(), Some("status:429"));
        assert_eq!(entries[1].details.as_deref(), Some("status:200"));
    }

    #[tokio::test]
    async fn audit_query_is_rate_limited() {
        let app = build_router(test_context(MockLlmClient::new("{}")));
        for _ in 0..middleware::rate::AUDIT_PER_MINUTE {
            let response = app.clone().oneshot(get("/api/audit")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = app.oneshot(get("/api/audit")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn health_is_never_rate_limited() {
        let app = build_router(test_context(MockLlmClient::new("{}")));
        for _ in 0..20 {
            let response = app.clone().oneshot(get("/health")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn legacy_triage_nested_shape() {
        let app = build_router(test_context(MockLlmClient::new("{}")));
        let body = json!({
            "text_input": "crushing chest pain",
            "vitals": {"HR": 88, "BP": "130/85", "SpO2": 97, "temp": 98.4, "RR": 18}
        });
        let response = app.oneshot(post_json("/triage", &body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["clinical_json"]["esi_level"], 2);
        assert_eq!(
            json["clinical_json"]["suggested_follow_up"],
            json["clinical_json"]["follow_up_questions"]
        );
        assert!(json["patient_text"].as_str().unwrap().contains("immediately"));
    }

    #[tokio::test]
    async fn legacy_triage_shares_validation() {
        let app = build_router(test_context(MockLlmClient::new("{}")));
        let body = json!({
            "text_input": "headache",
            "vitals": {"HR": 400, "BP": "130/85", "SpO2": 97, "temp": 98.4, "RR": 18}
        });
        let response = app.clone().oneshot(post_json("/triage", &body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = json!({
            "text_input": "headache",
            "vitals": {"HR": 80, "BP": "high", "SpO2": 97, "temp": 98.4, "RR": 18}
        });
        let response = app.oneshot(post_json("/triage", &body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = json_body(response).await;
        assert_eq!(json["detail"][0]["field"], "vitals.BP");
    }

    #[tokio::test]
    async fn generate_note_returns_export_bundle() {
        let app = build_router(test_context(MockLlmClient::new(NOTE_JSON)));
        let body = json!({
            "encounter_text": "Five days of cough, low grade fever",
            "patient_context": "34M, no history",
            "encounter_type": "ER visit"
        });
        let response = app.oneshot(post_json("/api/generate-note", &body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["json"]["soap_note"]["assessment"], "Viral bronchitis likely");
        assert_eq!(json["json"]["metadata"]["model_generated"], true);
        assert_eq!(json["patient_handout"], "You have a chest cold.");
        assert_eq!(json["fhir"]["resourceType"], "Composition");
        assert_eq!(json["fhir"]["subject"]["display"], "Patient ID: P-123");
        assert!(json["plain_text"].as_str().unwrap().starts_with("CLINICAL NOTE - "));
    }

    #[tokio::test]
    async fn generate_note_falls_back_when_model_fails() {
        let app = build_router(test_context(MockLlmClient::new("not json at all")));
        let body = json!({"encounter_text": "Ankle sprain after fall"});
        let response = app.oneshot(post_json("/api/generate-note", &body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["json"]["metadata"]["model_generated"], false);
        assert_eq!(json["json"]["metadata"]["encounter_type"], "Emergency");
        assert_eq!(json["json"]["icd10"][0], "R10.9");
    }

    #[tokio::test]
    async fn requests_are_audited() {
        let ctx = test_context(MockLlmClient::new("{}"));
        let app = build_router(ctx.clone());
        app.clone()
            .oneshot(post_json("/api/triage", &triage_body("fall", 80, 120, 98)))
            .await
            .unwrap();
        app.clone().oneshot(get("/health")).await.unwrap();

        let response = app
            .oneshot(get("/api/audit?action=TRIAGE_MULTIMODAL"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["count"], 1);
        let entry = &json["entries"][0];
        assert_eq!(entry["actor"], "anonymous_er_staff");
        assert_eq!(entry["resource"], "/api/triage");
        assert_eq!(entry["details"], "status:200");
        assert!(entry.get("ip_address").is_none());

        // Triage + the audit query itself; health is not audited.
        let total = ctx
            .with_db(|conn| crate::db::count_audit_entries(conn))
            .unwrap();
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn failed_requests_are_audited_with_status() {
        let ctx = test_context(MockLlmClient::new("{}"));
        let app = build_router(ctx.clone());
        app.oneshot(post_json("/api/triage", &triage_body("x", 80, 120, 101)))
            .await
            .unwrap();
        let entries = ctx
            .with_db(|conn| crate::db::query_audit_log(conn, &crate::db::AuditFilter::default()))
            .unwrap();
        assert_eq!(entries[0].details.as_deref(), Some("status:422"));
        assert_eq!(entries[0].action, "TRIAGE_MULTIMODAL");
    }

    #[tokio::test]
    async fn audit_rejects_unknown_action() {
        let app = build_router(test_context(MockLlmClient::new("{}")));
        let response = app.oneshot(get("/api/audit?action=LOGIN")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn audit_rejects_malformed_limit() {
        let app = build_router(test_context(MockLlmClient::new("{}")));
        let response = app.oneshot(get("/api/audit?limit=lots")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn model_info_reports_configured_model() {
        let app = build_router(test_context(MockLlmClient::new("{}")));
        let response = app.oneshot(get("/api/model")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["name"], "medgemma:7b-q4_k_m");
        assert_eq!(json["quantization"], "4bit");
        assert_eq!(json["loaded"], false);
        assert_eq!(json["context_length"], 2048);
    }

    #[tokio::test]
    async fn unknown_route_is_404_detail() {
        let app = build_router(test_context(MockLlmClient::new("{}")));
        let response = app.oneshot(get("/nonexistent")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await, json!({"detail": "Not Found"}));
    }
}
