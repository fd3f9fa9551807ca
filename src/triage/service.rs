use crate::models::{TriageResult, Vitals, VitalsError};
use crate::preprocess;
use crate::privacy::deidentify_text;

use super::classifier::classify;

/// Validate, then classify. Keyword rules see the complaint as entered;
/// only the de-identified, normalized text is prepared for the model.
#[derive(Debug, Default, Clone, Copy)]
pub struct TriageService;

impl TriageService {
    pub fn new() -> Self {
        Self
    }

    pub fn assess(
        &self,
        complaint: &str,
        vitals: &Vitals,
        image_base64: Option<&str>,
    ) -> Result<TriageResult, VitalsError> {
        vitals.validate()?;

        let scrubbed = deidentify_text(complaint);
        let prepared = preprocess::prepare(&scrubbed, vitals, image_base64);
        let result = classify(complaint, &prepared.vitals);

        tracing::info!(
            esi_level = result.esi_level.value(),
            confidence = result.confidence,
            has_image = prepared.image.is_some(),
            text_chars = prepared.text.chars().count(),
            "Triage assessment complete"
        );
        Ok(result)
    }
}
