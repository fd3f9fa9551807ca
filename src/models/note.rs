use serde::{Deserialize, Deserializer, Serialize};

/// Subjective / Objective / Assessment / Plan sections.
///
/// Sections default to empty so a partial model response still parses;
/// the quality checker reports the gaps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoapNote {
    pub subjective: String,
    pub objective: String,
    pub assessment: String,
    pub plan: String,
}

impl SoapNote {
    /// Sections in documentation order, with their lowercase keys.
    pub fn sections(&self) -> [(&'static str, &str); 4] {
        [
            ("subjective", &self.subjective),
            ("objective", &self.objective),
            ("assessment", &self.assessment),
            ("plan", &self.plan),
        ]
    }
}

/// Raw note content as produced by the model (or the fallback template).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteContent {
    pub soap_note: SoapNote,
    #[serde(deserialize_with = "lenient_codes")]
    pub icd10: Vec<String>,
    #[serde(deserialize_with = "lenient_codes")]
    pub cpt: Vec<String>,
    pub handoff: String,
    pub patient_handout: String,
}

/// Models return codes as `"R10.9"`, `["R10.9"]` or
/// `[{"code": "R10.9", "description": "..."}]`; keep just the codes.
/// `null` is an empty list.
fn lenient_codes<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Code {
        Plain(String),
        Described { code: String },
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Codes {
        One(String),
        Many(Vec<Code>),
    }

    Ok(match Option::<Codes>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Codes::One(code)) => vec![code],
        Some(Codes::Many(codes)) => codes
            .into_iter()
            .map(|c| match c {
                Code::Plain(code) | Code::Described { code } => code,
            })
            .collect(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    pub is_complete: bool,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteMetadata {
    pub encounter_type: String,
    pub template_used: String,
    pub model: String,
    /// `false` when the fallback template replaced model output.
    pub model_generated: bool,
}

/// A finished SOAP note with codes, quality checks and provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedNote {
    pub soap_note: SoapNote,
    pub icd10: Vec<String>,
    pub cpt: Vec<String>,
    pub handoff: String,
    pub patient_handout: String,
    pub quality_checks: QualityReport,
    pub metadata: NoteMetadata,
}
