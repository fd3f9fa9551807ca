use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Identifying patient fields in plaintext. Only ever held in memory;
/// the repository stores each field encrypted. Wiped on drop.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct PatientDemographics {
    pub name: String,
    pub date_of_birth: String,
    pub ssn: String,
    pub medical_history: String,
}

impl std::fmt::Debug for PatientDemographics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatientDemographics").finish_non_exhaustive()
    }
}

/// A decrypted patient row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientRecord {
    pub id: i64,
    pub demographics: PatientDemographics,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_fields() {
        let demo = PatientDemographics {
            name: "Jane Roe".into(),
            date_of_birth: "1970-01-01".into(),
            ssn: "123-45-6789".into(),
            medical_history: "asthma".into(),
        };
        let rendered = format!("{demo:?}");
        assert!(!rendered.contains("Jane"));
        assert!(!rendered.contains("123-45-6789"));
    }
}
