//! Shared state and request/response types for the HTTP layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::api::cache::ResponseCache;
use crate::api::error::ApiError;
use crate::crypto::FieldCipher;
use crate::documentation::DocumentationService;
use crate::inference::ModelManager;
use crate::models::{EsiLevel, LegacyVitals, TriageResult, Vitals};
use crate::triage::TriageService;

// ═══════════════════════════════════════════════════════════
// API context — shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub triage: Arc<TriageService>,
    pub documentation: Arc<DocumentationService>,
    pub models: Arc<ModelManager>,
    pub db: Arc<Mutex<Connection>>,
    pub cipher: Arc<FieldCipher>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
    pub cache: ResponseCache,
}

impl ApiContext {
    pub fn new(
        documentation: Arc<DocumentationService>,
        models: Arc<ModelManager>,
        db: Connection,
        cipher: Arc<FieldCipher>,
        cache: ResponseCache,
    ) -> Self {
        Self {
            triage: Arc::new(TriageService::new()),
            documentation,
            models,
            db: Arc::new(Mutex::new(db)),
            cipher,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new())),
            cache,
        }
    }

    /// Run `f` with the database connection held for one statement batch.
    pub fn with_db<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Connection) -> Result<T, crate::db::DatabaseError>,
    {
        let conn = self
            .db
            .lock()
            .map_err(|_| ApiError::Internal("database lock poisoned".into()))?;
        Ok(f(&*conn)?)
    }
}

// ═══════════════════════════════════════════════════════════
// Rate limiter — per-client, per-route sliding window
// ═══════════════════════════════════════════════════════════

/// Sliding-window limiter keyed by client and route.
pub struct RateLimiter {
    windows: HashMap<String, Vec<Instant>>,
    window: Duration,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(60))
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            windows: HashMap::new(),
            window,
        }
    }

    /// Record a hit for `key` if fewer than `limit` hits fall inside the
    /// window. Returns `Err(retry_after_secs)` otherwise.
    pub fn check(&mut self, key: &str, limit: u32) -> Result<(), u64> {
        let now = Instant::now();
        let window = self.window;

        // Periodic cleanup when many clients have come and gone
        if self.windows.len() > 1000 {
            self.windows
                .retain(|_, hits| hits.iter().any(|ts| now.duration_since(*ts) < window));
        }

        let hits = self.windows.entry(key.to_string()).or_default();
        hits.retain(|ts| now.duration_since(*ts) < window);

        if hits.len() as u32 >= limit {
            let oldest = hits.first().copied().unwrap_or(now);
            let wait = window.saturating_sub(now.duration_since(oldest));
            return Err(wait.as_secs().max(1));
        }

        hits.push(now);
        Ok(())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════
// Request / response bodies
// ═══════════════════════════════════════════════════════════

/// `POST /api/triage`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageRequest {
    pub chief_complaint: String,
    pub vitals: Vitals,
    #[serde(default)]
    pub image_base64: Option<String>,
}

/// `POST /api/generate-note`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteRequest {
    pub encounter_text: String,
    #[serde(default)]
    pub patient_context: Option<String>,
    #[serde(default = "default_encounter_type")]
    pub encounter_type: String,
}

fn default_encounter_type() -> String {
    "Emergency".to_string()
}

/// Identifier attached to notes until the workstation sends real patient ids.
pub const DEFAULT_PATIENT_ID: &str = "P-123";

impl NoteRequest {
    /// Context object handed to the documentation service.
    pub fn context_value(&self) -> serde_json::Value {
        let mut context = serde_json::json!({ "patient_id": DEFAULT_PATIENT_ID });
        if let Some(extra) = self.patient_context.as_deref().filter(|c| !c.is_empty()) {
            context["context"] = serde_json::Value::String(extra.to_string());
        }
        context
    }
}

/// `POST /triage` (older nested surface)
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyTriageRequest {
    pub text_input: String,
    pub vitals: LegacyVitals,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyClinicalJson {
    pub esi_level: EsiLevel,
    pub confidence_score: f32,
    pub red_flag_conditions: Vec<String>,
    pub follow_up_questions: Vec<String>,
    /// Duplicate of `follow_up_questions` kept for older clients.
    pub suggested_follow_up: Vec<String>,
    pub recommended_next_steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyTriageResponse {
    pub clinical_json: LegacyClinicalJson,
    pub patient_text: String,
}

impl From<TriageResult> for LegacyTriageResponse {
    fn from(result: TriageResult) -> Self {
        Self {
            clinical_json: LegacyClinicalJson {
                esi_level: result.esi_level,
                confidence_score: result.confidence,
                red_flag_conditions: result.red_flags,
                suggested_follow_up: result.follow_up_questions.clone(),
                follow_up_questions: result.follow_up_questions,
                recommended_next_steps: result.recommended_next_steps,
            },
            patient_text: result.patient_explanation,
        }
    }
}

/// `GET /api/audit` query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    pub actor: Option<String>,
    pub action: Option<String>,
    pub limit: Option<u32>,
}
