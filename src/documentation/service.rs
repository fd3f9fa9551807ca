use std::sync::Arc;

use serde_json::Value;

use crate::inference::{MicroBatcher, ModelError, ModelManager};
use crate::models::{GeneratedNote, NoteContent, NoteMetadata, SoapNote};
use crate::privacy::deidentify_text;

use super::export::{format_all, ExportBundle};
use super::quality;
use super::templates::{get_template, NoteTemplate};

pub const SYSTEM_PROMPT: &str =
    "You are a clinical documentation assistant using the MedGemma model. Output only JSON.";

/// Characters of the encounter echoed into a fallback note.
const FALLBACK_ECHO_CHARS: usize = 50;

#[derive(Debug, thiserror::Error)]
enum DraftError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("no JSON object in model response")]
    NoJson,

    #[error("model JSON did not match the note shape: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Drafts SOAP notes through the batching queue, with a deterministic
/// template note whenever the model is unavailable or answers badly.
pub struct DocumentationService {
    batcher: Arc<MicroBatcher>,
    models: Arc<ModelManager>,
}

impl DocumentationService {
    pub fn new(batcher: Arc<MicroBatcher>, models: Arc<ModelManager>) -> Self {
        Self { batcher, models }
    }

    pub async fn generate_note(
        &self,
        encounter_text: &str,
        patient_context: &Value,
        encounter_type: &str,
    ) -> ExportBundle {
        let template = get_template(encounter_type);
        let scrubbed = deidentify_text(encounter_text);

        let (content, model_generated) =
            match self.draft(&scrubbed, patient_context, encounter_type, template).await {
                Ok(content) => (content, true),
                Err(e) => {
                    tracing::warn!(error = %e, "Note drafting failed, using fallback template");
                    (fallback_content(&scrubbed), false)
                }
            };

        let quality_checks = quality::run_all(&content.soap_note, template.quality_requirements);
        tracing::info!(
            template = template.key,
            model_generated,
            quality_issues = quality_checks.issues.len(),
            "Clinical note generated"
        );

        let note = GeneratedNote {
            soap_note: content.soap_note,
            icd10: content.icd10,
            cpt: content.cpt,
            handoff: content.handoff,
            patient_handout: content.patient_handout,
            quality_checks,
            metadata: NoteMetadata {
                encounter_type: encounter_type.to_string(),
                template_used: template.description.to_string(),
                model: self.models.config().ollama_tag(),
                model_generated,
            },
        };
        format_all(note, patient_context)
    }

    async fn draft(
        &self,
        text: &str,
        patient_context: &Value,
        encounter_type: &str,
        template: &NoteTemplate,
    ) -> Result<NoteContent, DraftError> {
        self.models.load().await?;
        let prompt = build_note_prompt(text, patient_context, encounter_type, template);
        let response = self.batcher.submit(&prompt, Some(SYSTEM_PROMPT)).await?;
        tracing::debug!(response_chars = response.len(), "Model response received");
        parse_note_response(&response)
    }
}

pub fn build_note_prompt(
    text: &str,
    patient_context: &Value,
    encounter_type: &str,
    template: &NoteTemplate,
) -> String {
    format!(
        "Generate a structured SOAP note for the following ER encounter.\n\
         {vignette}\n\
         Patient Context: {context}\n\
         Encounter Type: {encounter_type}\n\
         Clinical Notes: {text}\n\
         \n\
         Requirements:\n\
         - Output MUST be valid JSON.\n\
         - Include sections: subjective, objective, assessment, plan.\n\
         - Provide relevant ICD-10 and CPT codes.\n\
         - Include a brief handoff summary.\n\
         - Create a 'patient_handout' summary written at a 6th-grade reading level.\n\
         - Use the keys soap_note (with subjective, objective, assessment, plan), icd10, cpt, handoff, patient_handout.",
        vignette = template.prompt_vignette,
        context = patient_context,
    )
}

/// Parse the outermost `{ ... }` block, ignoring any chatter around it.
fn parse_note_response(response: &str) -> Result<NoteContent, DraftError> {
    let start = response.find('{').ok_or(DraftError::NoJson)?;
    let end = response.rfind('}').ok_or(DraftError::NoJson)?;
    if end < start {
        return Err(DraftError::NoJson);
    }
    Ok(serde_json::from_str(&response[start..=end])?)
}

fn fallback_content(text: &str) -> NoteContent {
    let echo: String = text.chars().take(FALLBACK_ECHO_CHARS).collect();
    NoteContent {
        soap_note: SoapNote {
            subjective: format!("Patient presents with: {echo}..."),
            objective: "Vitals stable. Physical exam deferred.".into(),
            assessment: "Acute presentation (Fallback mode).".into(),
            plan: "Follow-up as per standard of care.".into(),
        },
        icd10: vec!["R10.9".into()],
        cpt: vec!["99283".into()],
        handoff: "Patient stable, awaiting further evaluation.".into(),
        patient_handout: "We have evaluated you for your symptoms. Your vital signs are stable. \
            Please follow up with your primary care physician in 2-3 days. \
            Return to ER if symptoms worsen."
            .into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{
        BatcherConfig, InferenceError, LlmClient, MockLlmClient, ModelConfig, Quantization,
    };
    use serde_json::json;

    const MODEL_JSON: &str = r#"Sure, here is the note:
{"soap_note":{"subjective":"Chest pain for two hours","objective":"HR 110, diaphoretic","assessment":"Suspected acute coronary syndrome","plan":"EKG, troponin, aspirin"},
 "icd10":["I21.9"],"cpt":["99285"],"handoff":"Awaiting cardiology","patient_handout":"Your heart is being checked."}
Let me know if you need anything else."#;

    fn service(client: MockLlmClient) -> (Arc<MockLlmClient>, DocumentationService) {
        let client = Arc::new(client);
        let config = ModelConfig::new("medgemma:7b-q4_k_m", Quantization::FourBit);
        let llm: Arc<dyn LlmClient> = client.clone();
        let batcher = Arc::new(MicroBatcher::spawn(
            Arc::clone(&llm),
            config.clone(),
            BatcherConfig::default(),
        ));
        let models = Arc::new(ModelManager::new(llm, config));
        (client, DocumentationService::new(batcher, models))
    }

    #[tokio::test]
    async fn parses_json_wrapped_in_chatter() {
        let (_, service) = service(MockLlmClient::new(MODEL_JSON));
        let bundle = service
            .generate_note("45M chest pain", &json!({"patient_id": "P-123"}), "ER visit")
            .await;

        let note = &bundle.json;
        assert_eq!(note.soap_note.assessment, "Suspected acute coronary syndrome");
        assert_eq!(note.icd10, vec!["I21.9"]);
        assert!(note.metadata.model_generated);
        assert_eq!(note.metadata.model, "medgemma:7b-q4_k_m");
        assert_eq!(
            note.metadata.template_used,
            "Emergency Department encounter with focus on acute presentation and triage."
        );
        assert!(note.quality_checks.is_complete);
        assert_eq!(bundle.patient_handout, "Your heart is being checked.");
    }

    #[tokio::test]
    async fn null_code_lists_keep_the_model_note() {
        let reply = r#"{"soap_note":{"subjective":"Fall from ladder","objective":"Wrist swelling","assessment":"Possible distal radius fracture","plan":"X-ray, splint"},"icd10":null,"cpt":null,"handoff":"Awaiting imaging","patient_handout":"We are checking your wrist."}"#;
        let (_, service) = service(MockLlmClient::new(reply));
        let bundle = service
            .generate_note("fell off ladder", &json!({"patient_id": "P-123"}), "Emergency")
            .await;

        assert!(bundle.json.metadata.model_generated);
        assert_eq!(bundle.json.soap_note.plan, "X-ray, splint");
        assert!(bundle.json.icd10.is_empty());
        assert!(bundle.json.cpt.is_empty());
    }

    #[tokio::test]
    async fn prompt_is_scrubbed_and_uses_system_prompt() {
        let (client, service) = service(MockLlmClient::new(MODEL_JSON));
        service
            .generate_note("SSN 123-45-6789 reports dizziness", &json!({"patient_id": "P-9"}), "general")
            .await;

        let requests = client.requests();
        let note_request = requests.last().unwrap();
        assert_eq!(note_request.system.as_deref(), Some(SYSTEM_PROMPT));
        assert!(note_request.prompt.contains("[SSN] reports dizziness"));
        assert!(!note_request.prompt.contains("6789"));
        assert!(note_request.prompt.contains(r#"Patient Context: {"patient_id":"P-9"}"#));
        assert!(note_request.prompt.contains("Encounter Type: general"));
    }

    #[tokio::test]
    async fn non_json_response_falls_back() {
        let (_, service) = service(MockLlmClient::new("I cannot help with that."));
        let bundle = service
            .generate_note("Abdominal pain since last night with nausea", &json!({}), "Emergency")
            .await;

        let note = &bundle.json;
        assert!(!note.metadata.model_generated);
        assert_eq!(note.icd10, vec!["R10.9"]);
        assert_eq!(note.cpt, vec!["99283"]);
        assert_eq!(
            note.soap_note.subjective,
            "Patient presents with: Abdominal pain since last night with nausea..."
        );
        assert_eq!(note.metadata.template_used, "Standard clinical encounter.");
        assert_eq!(note.metadata.encounter_type, "Emergency");
    }

    #[tokio::test]
    async fn inference_failure_falls_back() {
        let (_, service) = service(MockLlmClient::failing(InferenceError::Connection(
            "http://localhost:11434".into(),
        )));
        let bundle = service.generate_note("cough", &json!({}), "follow-up").await;
        assert!(!bundle.json.metadata.model_generated);
        assert_eq!(bundle.json.soap_note.objective, "Vitals stable. Physical exam deferred.");
        assert!(bundle.plain_text.contains("HANDOFF SUMMARY:\nPatient stable, awaiting further evaluation."));
    }

    #[tokio::test]
    async fn missing_model_falls_back_without_submitting() {
        let (client, service) =
            service(MockLlmClient::new(MODEL_JSON).with_models(vec!["llama3:8b".into()]));
        let bundle = service.generate_note("cough", &json!({}), "general").await;
        assert!(!bundle.json.metadata.model_generated);
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn incomplete_model_note_is_flagged() {
        let (_, service) = service(MockLlmClient::new(
            r#"{"soap_note":{"subjective":"Headache for 3 days","objective":"","assessment":"Migraine","plan":"Rest"}}"#,
        ));
        let bundle = service.generate_note("headache", &json!({}), "general").await;
        let checks = &bundle.json.quality_checks;
        assert!(!checks.is_complete);
        assert_eq!(
            checks.issues,
            vec![
                "Missing or incomplete Objective section.",
                "Missing or incomplete Assessment section.",
                "Missing or incomplete Plan section.",
            ]
        );
    }

    #[test]
    fn fallback_echo_is_char_bounded() {
        let text = "ü".repeat(80);
        let content = fallback_content(&text);
        assert_eq!(
            content.soap_note.subjective,
            format!("Patient presents with: {}...", "ü".repeat(50))
        );
    }

    #[test]
    fn reversed_braces_are_rejected() {
        assert!(matches!(parse_note_response("} oops {"), Err(DraftError::NoJson)));
        assert!(matches!(parse_note_response("no braces"), Err(DraftError::NoJson)));
    }
}
