use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::GeneratedNote;

const RULE_WIDTH: usize = 40;

/// Every export representation of one note, as returned by
/// `POST /api/generate-note`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub json: GeneratedNote,
    pub plain_text: String,
    pub patient_handout: String,
    pub fhir: Value,
}

pub fn format_all(note: GeneratedNote, patient_context: &Value) -> ExportBundle {
    format_all_at(note, patient_context, Utc::now())
}

/// `format_all` with a fixed clock.
pub fn format_all_at(note: GeneratedNote, patient_context: &Value, now: DateTime<Utc>) -> ExportBundle {
    let plain_text = to_plain_text(&note, now);
    let fhir = to_fhir(&plain_text, patient_context, now);
    ExportBundle {
        patient_handout: note.patient_handout.clone(),
        json: note,
        plain_text,
        fhir,
    }
}

pub fn to_plain_text(note: &GeneratedNote, now: DateTime<Utc>) -> String {
    let mut text = format!("CLINICAL NOTE - {}\n", timestamp(now));
    text.push_str(&"=".repeat(RULE_WIDTH));
    text.push('\n');

    for (section, content) in note.soap_note.sections() {
        text.push_str(&section.to_uppercase());
        text.push_str(":\n");
        text.push_str(content);
        text.push_str("\n\n");
    }

    text.push_str("ICD-10 CODES:\n");
    text.push_str(&note.icd10.join(", "));
    text.push_str("\n\nCPT CODES:\n");
    text.push_str(&note.cpt.join(", "));
    text.push_str("\n\nHANDOFF SUMMARY:\n");
    text.push_str(&note.handoff);
    text
}

/// Minimal FHIR R4 `Composition` wrapping the plain-text rendering.
pub fn to_fhir(plain_text: &str, patient_context: &Value, now: DateTime<Utc>) -> Value {
    let patient_id = match patient_context.get("patient_id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Null) | None => "Unknown".to_string(),
        Some(other) => other.to_string(),
    };
    let div = format!(
        "<div xmlns='http://www.w3.org/1999/xhtml'>{}</div>",
        escape_xml(plain_text).replace('\n', "<br/>")
    );

    json!({
        "resourceType": "Composition",
        "status": "final",
        "type": {
            "coding": [{
                "system": "http://loinc.org",
                "code": "11506-3",
                "display": "Provider-unspecified Progress note"
            }]
        },
        "subject": { "display": format!("Patient ID: {patient_id}") },
        "date": timestamp(now),
        "author": [{ "display": "MedGemma AI Generator" }],
        "title": "Clinical Encounter Note",
        "section": [{
            "title": "SOAP Note",
            "text": { "status": "generated", "div": div }
        }]
    })
}

fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
