use serde::{Deserialize, Serialize};

/// Emergency Severity Index level. 1 is most urgent, 5 least.
///
/// The inner value is private so no other level can be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct EsiLevel(u8);

impl EsiLevel {
    pub const RESUSCITATION: EsiLevel = EsiLevel(1);
    pub const EMERGENT: EsiLevel = EsiLevel(2);
    pub const URGENT: EsiLevel = EsiLevel(3);
    pub const LESS_URGENT: EsiLevel = EsiLevel(4);
    pub const NON_URGENT: EsiLevel = EsiLevel(5);

    pub fn value(self) -> u8 {
        self.0
    }

    /// ESI 1 and 2 need a clinician immediately.
    pub fn is_high_acuity(self) -> bool {
        self.0 <= 2
    }

    /// The more urgent of two levels.
    pub fn most_urgent(self, other: EsiLevel) -> EsiLevel {
        if other.0 < self.0 { other } else { self }
    }
}

impl TryFrom<u8> for EsiLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (1..=5).contains(&value) {
            Ok(EsiLevel(value))
        } else {
            Err(format!("ESI level must be between 1 and 5, got {value}"))
        }
    }
}

impl From<EsiLevel> for u8 {
    fn from(level: EsiLevel) -> u8 {
        level.0
    }
}

impl std::fmt::Display for EsiLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of triaging one patient presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageResult {
    pub esi_level: EsiLevel,
    pub reasoning: String,
    pub confidence: f32,
    pub red_flags: Vec<String>,
    pub follow_up_questions: Vec<String>,
    pub recommended_next_steps: Vec<String>,
    pub patient_explanation: String,
}
