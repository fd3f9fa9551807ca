//! Regex de-identification applied to free text before it leaves the process.
//!
//! Patterns run in a fixed order, each once over the whole text, replacing
//! non-overlapping matches with a bracketed placeholder. There is no context
//! awareness: names and unusual formats pass through untouched.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Kind of identifier a pattern targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiKind {
    Ssn,
    Phone,
    Email,
    Address,
    Date,
}

impl PiiKind {
    pub fn placeholder(self) -> &'static str {
        match self {
            PiiKind::Ssn => "[SSN]",
            PiiKind::Phone => "[PHONE]",
            PiiKind::Email => "[EMAIL]",
            PiiKind::Address => "[ADDRESS]",
            PiiKind::Date => "[DATE]",
        }
    }
}

struct PiiPattern {
    regex: Regex,
    kind: PiiKind,
}

/// Substitution order matters: SSNs go first so their digits never reach
/// the phone pattern.
static PII_PATTERNS: LazyLock<Vec<PiiPattern>> = LazyLock::new(|| {
    vec![
        pattern(r"\b\d{3}-\d{2}-\d{4}\b", PiiKind::Ssn),
        pattern(r"\b\d{10}\b", PiiKind::Phone),
        pattern(
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            PiiKind::Email,
        ),
        pattern(
            r"\b\d{1,5}\s+(?:[A-Z][A-Za-z0-9]*\s+){1,3}(?:(?:Street|Avenue|Road|Boulevard|Lane|Drive|Court|Way)\b|(?:Ave|Rd|Blvd|Ln|Ct)\b\.?|(?:St|Dr)\.)",
            PiiKind::Address,
        ),
        pattern(r"\b\d{2}/\d{2}/\d{4}\b", PiiKind::Date),
    ]
});

fn pattern(regex_str: &str, kind: PiiKind) -> PiiPattern {
    PiiPattern {
        regex: Regex::new(regex_str).expect("Invalid PII regex pattern"),
        kind,
    }
}

/// Replace every recognised identifier with its placeholder.
pub fn deidentify_text(text: &str) -> String {
    let mut scrubbed = text.to_string();
    let mut replaced = 0usize;

    for p in PII_PATTERNS.iter() {
        let count = p.regex.find_iter(&scrubbed).count();
        if count > 0 {
            replaced += count;
            scrubbed = p
                .regex
                .replace_all(&scrubbed, p.kind.placeholder())
                .into_owned();
        }
    }

    if replaced > 0 {
        tracing::debug!(replaced, "De-identification replaced identifiers");
    }
    scrubbed
}

/// Which identifier kinds appear in `text`, in pattern order. Text is not modified.
pub fn flag_sensitive_content(text: &str) -> Vec<PiiKind> {
    PII_PATTERNS
        .iter()
        .filter(|p| p.regex.is_match(text))
        .map(|p| p.kind)
        .collect()
}

/// Hex SHA-256 of an identifier, for correlating records without storing it.
pub fn secure_hash(patient_id: &str) -> String {
    let digest = Sha256::digest(patient_id.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
