use std::fmt::Write;

use crate::models::Vitals;

/// Render the complaint and vitals as a model prompt. Same input, same text.
pub fn build_triage_prompt(complaint: &str, vitals: &Vitals) -> String {
    let mut prompt = String::with_capacity(complaint.len() + 256);
    prompt.push_str("Emergency department triage assessment.\n\n");
    prompt.push_str("Chief complaint:\n");
    prompt.push_str(if complaint.is_empty() { "(none provided)" } else { complaint });
    prompt.push_str("\n\nVital signs:\n");

    // Writing to a String cannot fail.
    let _ = writeln!(prompt, "- Heart rate: {} bpm", vitals.hr);
    let _ = writeln!(prompt, "- Blood pressure: {}/{} mmHg", vitals.bp_sys, vitals.bp_dia);
    let _ = writeln!(prompt, "- SpO2: {}%", vitals.spo2);
    let _ = writeln!(prompt, "- Temperature: {:.1} °F", vitals.temp);
    let _ = writeln!(prompt, "- Respiratory rate: {} breaths/min", vitals.rr);

    prompt.push_str("\nAssign an Emergency Severity Index level (1-5) and list red flags.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vitals() -> Vitals {
        Vitals {
            hr: 112,
            bp_sys: 150,
            bp_dia: 92,
            spo2: 95,
            temp: 100.4,
            rr: 20,
        }
    }

    #[test]
    fn lists_every_vital_with_units() {
        let prompt = build_triage_prompt("fever and cough", &vitals());
        assert!(prompt.contains("Chief complaint:\nfever and cough"));
        assert!(prompt.contains("- Heart rate: 112 bpm"));
        assert!(prompt.contains("- Blood pressure: 150/92 mmHg"));
        assert!(prompt.contains("- SpO2: 95%"));
        assert!(prompt.contains("- Temperature: 100.4 °F"));
        assert!(prompt.contains("- Respiratory rate: 20 breaths/min"));
    }

    #[test]
    fn deterministic() {
        assert_eq!(
            build_triage_prompt("x", &vitals()),
            build_triage_prompt("x", &vitals())
        );
    }

    #[test]
    fn empty_complaint_is_marked() {
        assert!(build_triage_prompt("", &vitals()).contains("(none provided)"));
    }
}
