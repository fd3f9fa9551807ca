/// A specialty note template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteTemplate {
    pub key: &'static str,
    pub description: &'static str,
    pub prompt_vignette: &'static str,
    pub quality_requirements: &'static [&'static str],
}

pub static ER_VISIT: NoteTemplate = NoteTemplate {
    key: "ER visit",
    description: "Emergency Department encounter with focus on acute presentation and triage.",
    prompt_vignette: "Generate a SOAP note for an Emergency Department visit. Focus on chief complaint, acuity, and stabilization plan.",
    quality_requirements: &["Acuity assessment", "Stabilization plan"],
};

pub static FOLLOW_UP: NoteTemplate = NoteTemplate {
    key: "follow-up",
    description: "Routine follow-up for chronic or resolving issues.",
    prompt_vignette: "Generate a clinical note for a follow-up visit. Focus on progress, medication compliance, and long-term management.",
    quality_requirements: &["Progress assessment", "Medication reconciliation"],
};

pub static GENERAL: NoteTemplate = NoteTemplate {
    key: "general",
    description: "Standard clinical encounter.",
    prompt_vignette: "Generate a comprehensive structured SOAP note.",
    quality_requirements: &["Completeness", "Clear Assessment & Plan"],
};

static TEMPLATES: [&NoteTemplate; 3] = [&ER_VISIT, &FOLLOW_UP, &GENERAL];

/// Exact-key lookup; anything else (including "Emergency") gets `GENERAL`.
pub fn get_template(encounter_type: &str) -> &'static NoteTemplate {
    TEMPLATES
        .iter()
        .copied()
        .find(|t| t.key == encounter_type)
        .unwrap_or(&GENERAL)
}
