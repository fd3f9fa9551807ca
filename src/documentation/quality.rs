use crate::models::{QualityReport, SoapNote};

/// Sections shorter than this (after trimming) count as missing.
const MIN_SECTION_CHARS: usize = 10;

/// One issue per SOAP section that is missing or too short.
pub fn check_completeness(note: &SoapNote) -> Vec<String> {
    note.sections()
        .iter()
        .filter(|(_, content)| content.trim().chars().count() < MIN_SECTION_CHARS)
        .map(|(name, _)| format!("Missing or incomplete {} section.", capitalize(name)))
        .collect()
}

/// Terminology validation hook. No vocabulary is wired in yet, so it
/// never reports issues.
pub fn check_terminology(_note: &SoapNote) -> Vec<String> {
    Vec::new()
}

/// Template requirements are accepted for future checks; completeness and
/// terminology decide the report today.
pub fn run_all(note: &SoapNote, requirements: &[&str]) -> QualityReport {
    let completeness = check_completeness(note);
    let is_complete = completeness.is_empty();

    let mut issues = completeness;
    issues.extend(check_terminology(note));

    tracing::debug!(
        requirements = requirements.len(),
        issues = issues.len(),
        "Quality checks complete"
    );

    QualityReport { is_complete, issues }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
