//! Input validation at the assessment boundary.
//!
//! Raw text collected by an intake flow is turned into an [`AssessmentInput`] here, or
//! rejected. Nothing downstream of this module sees unvalidated option tokens.

use crate::assessment::{AssessmentInput, RawAssessment};
use crate::error::ValidationError;
use swasth_types::NonEmptyText;

impl TryFrom<RawAssessment> for AssessmentInput {
    type Error = ValidationError;

    fn try_from(raw: RawAssessment) -> Result<Self, Self::Error> {
        validate_assessment(&raw)
    }
}

/// Validates a raw assessment.
///
/// Checks run in field order (symptoms, age group, duration, severity, medicine) and the first
/// failure is returned.
///
/// # Errors
///
/// - `EmptySymptoms` if no symptom was supplied,
/// - `BlankSymptom` if any supplied symptom identifier is blank,
/// - `Unknown*` for any option token outside its closed set.
pub fn validate_assessment(raw: &RawAssessment) -> Result<AssessmentInput, ValidationError> {
    if raw.symptoms.is_empty() {
        return Err(ValidationError::EmptySymptoms);
    }

    let symptoms = raw
        .symptoms
        .iter()
        .map(|s| NonEmptyText::new(s).map_err(|_| ValidationError::BlankSymptom))
        .collect::<Result<Vec<_>, _>>()?;

    AssessmentInput::new(
        symptoms,
        raw.age_group.parse()?,
        raw.duration.parse()?,
        raw.severity.parse()?,
        raw.medicine.parse()?,
    )
}

/// Splits a comma-separated symptom list (as typed on a command line), dropping empty items.
pub fn parse_symptom_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::{AgeGroup, MedicineTaken, Severity, SymptomDuration};

    fn raw(symptoms: &[&str]) -> RawAssessment {
        RawAssessment {
            symptoms: symptoms.iter().map(|s| s.to_string()).collect(),
            age_group: "41-60".into(),
            duration: "3-5".into(),
            severity: "moderate".into(),
            medicine: "other".into(),
        }
    }

    #[test]
    fn test_valid_assessment_parses_every_field() {
        let input = AssessmentInput::try_from(raw(&["fever", " cough "])).unwrap();

        assert_eq!(input.symptoms().len(), 2);
        assert_eq!(input.symptoms()[1].as_str(), "cough");
        assert_eq!(input.age_group(), AgeGroup::From41To60);
        assert_eq!(input.duration(), SymptomDuration::ThreeToFiveDays);
        assert_eq!(input.severity(), Severity::Moderate);
        assert_eq!(input.medicine(), MedicineTaken::Other);
    }

    #[test]
    fn test_empty_symptoms_rejected() {
        assert_eq!(
            validate_assessment(&raw(&[])).unwrap_err(),
            ValidationError::EmptySymptoms
        );
    }

    #[test]
    fn test_blank_symptom_rejected() {
        assert_eq!(
            validate_assessment(&raw(&["fever", "  "])).unwrap_err(),
            ValidationError::BlankSymptom
        );
    }

    #[test]
    fn test_invalid_option_rejected_with_value() {
        let mut bad = raw(&["fever"]);
        bad.severity = "extreme".into();

        assert_eq!(
            validate_assessment(&bad).unwrap_err(),
            ValidationError::UnknownSeverity("extreme".into())
        );
    }

    #[test]
    fn test_parse_symptom_list_drops_blanks() {
        assert_eq!(
            parse_symptom_list("fever, cough,,  ,bodyPain"),
            vec!["fever", "cough", "bodyPain"]
        );
        assert!(parse_symptom_list("").is_empty());
    }
}
