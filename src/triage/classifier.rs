use crate::models::{EsiLevel, TriageResult, Vitals};

use super::keywords::{high_risk_matches, ComplaintTopic};

const CONFIDENCE_RESUSCITATION: f32 = 0.95;
const CONFIDENCE_EMERGENT: f32 = 0.90;
const CONFIDENCE_DEFAULT: f32 = 0.85;
const CONFIDENCE_KEYWORD_OVERRIDE: f32 = 0.92;

const DEFAULT_REASONING: &str = "Automated triage assessment based on vitals and notes.";

/// Deterministic rule cascade over vitals and complaint text.
///
/// Vital thresholds pick ESI 1, 2 or 3; a high-risk complaint can only
/// make the level more urgent (never below 2). Everything else is derived
/// from the final level and the complaint topic.
pub fn classify(text: &str, vitals: &Vitals) -> TriageResult {
    let (mut level, mut confidence, vital_findings) = assess_vitals(vitals);
    let keywords = high_risk_matches(text);

    let mut reasons = Vec::new();
    if !vital_findings.is_empty() {
        reasons.push(format!(
            "ESI {level} vital-sign criteria met: {}.",
            vital_findings.join(", ")
        ));
    }
    if !keywords.is_empty() {
        let overridden = level.most_urgent(EsiLevel::EMERGENT);
        if overridden != level {
            level = overridden;
            confidence = CONFIDENCE_KEYWORD_OVERRIDE;
            reasons.push(format!(
                "High-risk complaint ({}) raises urgency to ESI {level}.",
                keywords.join(", ")
            ));
        } else {
            reasons.push(format!("High-risk complaint ({}).", keywords.join(", ")));
        }
    }

    let reasoning = if reasons.is_empty() {
        DEFAULT_REASONING.to_string()
    } else {
        reasons.join(" ")
    };

    TriageResult {
        esi_level: level,
        reasoning,
        confidence,
        red_flags: red_flags(level),
        follow_up_questions: ComplaintTopic::detect(text)
            .follow_up_questions()
            .iter()
            .map(|q| q.to_string())
            .collect(),
        recommended_next_steps: next_steps(level),
        patient_explanation: patient_explanation(level),
    }
}

/// Returns the vital-sign level, its confidence and the thresholds crossed.
fn assess_vitals(v: &Vitals) -> (EsiLevel, f32, Vec<String>) {
    let mut critical = Vec::new();
    if v.spo2 < 90 {
        critical.push(format!("SpO2 {}% below 90%", v.spo2));
    }
    if v.hr > 130 {
        critical.push(format!("heart rate {} bpm above 130", v.hr));
    }
    if v.bp_sys > 200 {
        critical.push(format!("systolic BP {} mmHg above 200", v.bp_sys));
    }
    if !critical.is_empty() {
        return (EsiLevel::RESUSCITATION, CONFIDENCE_RESUSCITATION, critical);
    }

    let mut emergent = Vec::new();
    if v.hr >= 100 {
        emergent.push(format!("heart rate {} bpm at or above 100", v.hr));
    }
    if v.rr > 22 {
        emergent.push(format!("respiratory rate {}/min above 22", v.rr));
    }
    if v.bp_sys >= 160 {
        emergent.push(format!("systolic BP {} mmHg at or above 160", v.bp_sys));
    }
    if !emergent.is_empty() {
        return (EsiLevel::EMERGENT, CONFIDENCE_EMERGENT, emergent);
    }

    (EsiLevel::URGENT, CONFIDENCE_DEFAULT, Vec::new())
}

fn red_flags(level: EsiLevel) -> Vec<String> {
    let flags: &[&str] = if level.is_high_acuity() {
        &["Sepsis", "Myocardial Infarction"]
    } else {
        &["Dehydration"]
    };
    flags.iter().map(|f| f.to_string()).collect()
}

fn next_steps(level: EsiLevel) -> Vec<String> {
    let steps: &[&str] = if level.is_high_acuity() {
        &["Stat EKG", "Troponin levels", "Chest X-ray"]
    } else {
        &["Observation", "Oral rehydration"]
    };
    steps.iter().map(|s| s.to_string()).collect()
}

fn patient_explanation(level: EsiLevel) -> String {
    let advice = if level.is_high_acuity() {
        "You should be seen by a clinician immediately."
    } else {
        "A clinician will be with you shortly. Please let us know if your symptoms worsen."
    };
    format!(
        "Based on your symptoms and vital signs, our system suggests an urgency level of {level}. {advice}"
    )
}
