use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Actor recorded for unauthenticated ER workstation requests.
pub const ANONYMOUS_ACTOR: &str = "anonymous_er_staff";

/// Audited actions. Stored as their SCREAMING_SNAKE names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    TriageMultimodal,
    TriageLegacy,
    GenerateSoap,
    AuditQuery,
    ModelInfo,
    RetentionPurge,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::TriageMultimodal => "TRIAGE_MULTIMODAL",
            AuditAction::TriageLegacy => "TRIAGE_LEGACY",
            AuditAction::GenerateSoap => "GENERATE_SOAP",
            AuditAction::AuditQuery => "AUDIT_QUERY",
            AuditAction::ModelInfo => "MODEL_INFO",
            AuditAction::RetentionPurge => "RETENTION_PURGE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "TRIAGE_MULTIMODAL" => Some(AuditAction::TriageMultimodal),
            "TRIAGE_LEGACY" => Some(AuditAction::TriageLegacy),
            "GENERATE_SOAP" => Some(AuditAction::GenerateSoap),
            "AUDIT_QUERY" => Some(AuditAction::AuditQuery),
            "MODEL_INFO" => Some(AuditAction::ModelInfo),
            "RETENTION_PURGE" => Some(AuditAction::RetentionPurge),
            _ => None,
        }
    }
}

/// An audit event before it is written. Rows are never updated once stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEvent {
    pub actor: String,
    pub action: AuditAction,
    pub resource: Option<String>,
    pub ip_address: Option<String>,
    pub details: Option<String>,
}

impl NewAuditEvent {
    pub fn new(actor: impl Into<String>, action: AuditAction) -> Self {
        Self {
            actor: actor.into(),
            action,
            resource: None,
            ip_address: None,
            details: None,
        }
    }

    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// A stored audit row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    pub resource: Option<String>,
    pub ip_address: Option<String>,
    pub details: Option<String>,
}
