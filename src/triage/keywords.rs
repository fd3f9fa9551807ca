use std::sync::LazyLock;

use regex::Regex;

/// A complaint phrase that forces at least ESI 2.
struct HighRiskPattern {
    regex: Regex,
    label: &'static str,
}

static HIGH_RISK_PATTERNS: LazyLock<Vec<HighRiskPattern>> = LazyLock::new(|| {
    vec![
        pattern(r"(?i)chest\s+pain", "chest pain"),
        pattern(r"(?i)stroke", "stroke"),
        pattern(r"(?i)difficulty\s+breathing", "difficulty breathing"),
        pattern(r"(?i)dyspn(?:o)?ea", "dyspnea"),
    ]
});

fn pattern(re: &str, label: &'static str) -> HighRiskPattern {
    HighRiskPattern {
        regex: Regex::new(re).expect("invalid high-risk pattern"),
        label,
    }
}

/// Labels of every high-risk phrase found in `text`, in pattern order.
pub fn high_risk_matches(text: &str) -> Vec<&'static str> {
    HIGH_RISK_PATTERNS
        .iter()
        .filter(|p| p.regex.is_match(text))
        .map(|p| p.label)
        .collect()
}

/// Body system a complaint points at, for picking follow-up questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplaintTopic {
    Cardiac,
    Abdominal,
    General,
}

impl ComplaintTopic {
    /// Cardiac wins over abdominal when both appear.
    pub fn detect(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("chest") || lower.contains("heart") {
            Self::Cardiac
        } else if lower.contains("abdomen") || lower.contains("stomach") {
            Self::Abdominal
        } else {
            Self::General
        }
    }

    pub fn follow_up_questions(self) -> &'static [&'static str] {
        match self {
            Self::Cardiac => &[
                "Does the pain radiate to your arm or jaw?",
                "Is the pain worse with exertion or rest?",
                "Do you have a history of heart disease?",
            ],
            Self::Abdominal => &[
                "Is the pain constant or does it come and go?",
                "Have you experienced any nausea or vomiting?",
                "When was your last bowel movement?",
            ],
            Self::General => &[
                "How long has the patient been experiencing these symptoms?",
                "Any history of similar episodes?",
                "Any known allergies to medications?",
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_are_case_insensitive() {
        assert_eq!(high_risk_matches("CHEST PAIN since 2am"), vec!["chest pain"]);
        assert_eq!(high_risk_matches("Possible Stroke"), vec!["stroke"]);
        assert_eq!(
            high_risk_matches("difficulty  breathing and dyspnoea"),
            vec!["difficulty breathing", "dyspnea"]
        );
    }

    #[test]
    fn benign_text_has_no_matches() {
        assert!(high_risk_matches("stubbed toe").is_empty());
        assert!(high_risk_matches("chest wall bruise").is_empty());
    }

    #[test]
    fn topic_detection() {
        assert_eq!(ComplaintTopic::detect("Heart racing"), ComplaintTopic::Cardiac);
        assert_eq!(ComplaintTopic::detect("stomach cramps"), ComplaintTopic::Abdominal);
        assert_eq!(ComplaintTopic::detect("chest and abdomen pain"), ComplaintTopic::Cardiac);
        assert_eq!(ComplaintTopic::detect("ankle sprain"), ComplaintTopic::General);
    }

    #[test]
    fn every_topic_has_three_questions() {
        for topic in [ComplaintTopic::Cardiac, ComplaintTopic::Abdominal, ComplaintTopic::General] {
            assert_eq!(topic.follow_up_questions().len(), 3);
        }
    }
}
