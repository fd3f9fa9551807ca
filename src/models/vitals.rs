use serde::{Deserialize, Serialize};

/// Bedside vital signs submitted with a triage request.
///
/// Ranges are plausibility limits, not clinical normals: a value outside
/// them is a data-entry error and is rejected before any triage logic runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    /// Heart rate (bpm), 0–300.
    pub hr: i32,
    /// Systolic blood pressure (mmHg), 0–300.
    pub bp_sys: i32,
    /// Diastolic blood pressure (mmHg), 0–200.
    pub bp_dia: i32,
    /// Oxygen saturation (%), 0–100.
    pub spo2: i32,
    /// Temperature (°F), 70–115.
    pub temp: f64,
    /// Respiratory rate (breaths/min), 0–100.
    pub rr: i32,
}

/// One out-of-range field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid vitals: {}", summarize(.0))]
pub struct VitalsError(pub Vec<FieldViolation>);

fn summarize(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{} {}", v.field, v.message))
        .collect::<Vec<_>>()
        .join("; ")
}

fn check_int(field: &'static str, value: i32, min: i32, max: i32, out: &mut Vec<FieldViolation>) {
    if value < min || value > max {
        out.push(FieldViolation {
            field,
            message: format!("must be between {min} and {max} (got {value})"),
        });
    }
}

impl Vitals {
    /// Check every field against its range, reporting all violations at once.
    pub fn validate(&self) -> Result<(), VitalsError> {
        let mut violations = Vec::new();
        check_int("hr", self.hr, 0, 300, &mut violations);
        check_int("bp_sys", self.bp_sys, 0, 300, &mut violations);
        check_int("bp_dia", self.bp_dia, 0, 200, &mut violations);
        check_int("spo2", self.spo2, 0, 100, &mut violations);
        check_int("rr", self.rr, 0, 100, &mut violations);
        if !self.temp.is_finite() || !(70.0..=115.0).contains(&self.temp) {
            violations.push(FieldViolation {
                field: "temp",
                message: format!("must be between 70 and 115 (got {})", self.temp),
            });
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(VitalsError(violations))
        }
    }
}

/// Vitals as sent by the older `/triage` surface: capitalized field names
/// and blood pressure as a single `"systolic/diastolic"` string.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyVitals {
    #[serde(rename = "HR")]
    pub hr: i32,
    #[serde(rename = "BP")]
    pub bp: String,
    #[serde(rename = "SpO2")]
    pub spo2: i32,
    pub temp: f64,
    #[serde(rename = "RR")]
    pub rr: i32,
}

impl TryFrom<LegacyVitals> for Vitals {
    type Error = VitalsError;

    /// Converts and then applies the same range checks as the current surface.
    fn try_from(legacy: LegacyVitals) -> Result<Self, Self::Error> {
        let (bp_sys, bp_dia) = parse_blood_pressure(&legacy.bp).ok_or_else(|| {
            VitalsError(vec![FieldViolation {
                field: "BP",
                message: format!("must look like '120/80' (got '{}')", legacy.bp),
            }])
        })?;

        let vitals = Vitals {
            hr: legacy.hr,
            bp_sys,
            bp_dia,
            spo2: legacy.spo2,
            temp: legacy.temp,
            rr: legacy.rr,
        };
        vitals.validate()?;
        Ok(vitals)
    }
}

/// Parse `"120/80"` into `(120, 80)`. Whitespace around either number is allowed.
pub fn parse_blood_pressure(raw: &str) -> Option<(i32, i32)> {
    let (sys, dia) = raw.split_once('/')?;
    let sys = sys.trim().parse().ok()?;
    let dia = dia.trim().parse().ok()?;
    Some((sys, dia))
}
