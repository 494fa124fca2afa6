//! Assessment input: the symptoms and context factors collected from a patient.
//!
//! Every option is a closed enum so an invalid value cannot be represented once parsed. The
//! string tokens (`below18`, `3-5`, `paracetamol`, ...) are the ones the intake screens and the
//! review backend exchange; [`FromStr`] is the only way in from raw text and it rejects unknown
//! tokens with a [`ValidationError`].

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use swasth_types::NonEmptyText;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeGroup {
    #[serde(rename = "below18")]
    Below18,
    #[serde(rename = "18-40")]
    From18To40,
    #[serde(rename = "41-60")]
    From41To60,
    #[serde(rename = "above60")]
    Above60,
}

impl AgeGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgeGroup::Below18 => "below18",
            AgeGroup::From18To40 => "18-40",
            AgeGroup::From41To60 => "41-60",
            AgeGroup::Above60 => "above60",
        }
    }

    /// Children and older adults score an extra risk point.
    pub fn is_vulnerable(&self) -> bool {
        matches!(self, AgeGroup::Below18 | AgeGroup::Above60)
    }
}

impl FromStr for AgeGroup {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "below18" => Ok(AgeGroup::Below18),
            "18-40" => Ok(AgeGroup::From18To40),
            "41-60" => Ok(AgeGroup::From41To60),
            "above60" => Ok(AgeGroup::Above60),
            other => Err(ValidationError::UnknownAgeGroup(other.to_owned())),
        }
    }
}

/// How long the symptoms have lasted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymptomDuration {
    #[serde(rename = "today")]
    Today,
    #[serde(rename = "1-2")]
    OneToTwoDays,
    #[serde(rename = "3-5")]
    ThreeToFiveDays,
    #[serde(rename = "more5")]
    MoreThanFiveDays,
}

impl SymptomDuration {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymptomDuration::Today => "today",
            SymptomDuration::OneToTwoDays => "1-2",
            SymptomDuration::ThreeToFiveDays => "3-5",
            SymptomDuration::MoreThanFiveDays => "more5",
        }
    }
}

impl FromStr for SymptomDuration {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "today" => Ok(SymptomDuration::Today),
            "1-2" => Ok(SymptomDuration::OneToTwoDays),
            "3-5" => Ok(SymptomDuration::ThreeToFiveDays),
            "more5" => Ok(SymptomDuration::MoreThanFiveDays),
            other => Err(ValidationError::UnknownDuration(other.to_owned())),
        }
    }
}

/// Self-reported severity. Ordered from mildest to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Mild, Severity::Moderate, Severity::Severe];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Mild => "mild",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
        }
    }
}

impl FromStr for Severity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "mild" => Ok(Severity::Mild),
            "moderate" => Ok(Severity::Moderate),
            "severe" => Ok(Severity::Severe),
            other => Err(ValidationError::UnknownSeverity(other.to_owned())),
        }
    }
}

/// Whether the patient has already taken medicine for these symptoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MedicineTaken {
    #[serde(rename = "none")]
    NotTaken,
    /// Common over-the-counter fever/pain medicine (paracetamol and the like).
    #[serde(rename = "paracetamol", alias = "common-otc")]
    CommonOtc,
    #[serde(rename = "other")]
    Other,
    #[serde(rename = "unsure")]
    Unsure,
}

impl MedicineTaken {
    pub fn as_str(&self) -> &'static str {
        match self {
            MedicineTaken::NotTaken => "none",
            MedicineTaken::CommonOtc => "paracetamol",
            MedicineTaken::Other => "other",
            MedicineTaken::Unsure => "unsure",
        }
    }
}

impl FromStr for MedicineTaken {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "none" => Ok(MedicineTaken::NotTaken),
            "paracetamol" | "common-otc" => Ok(MedicineTaken::CommonOtc),
            "other" => Ok(MedicineTaken::Other),
            "unsure" => Ok(MedicineTaken::Unsure),
            other => Err(ValidationError::UnknownMedicine(other.to_owned())),
        }
    }
}

/// Answer to "do you have any existing health conditions?". Recorded, not scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExistingConditions {
    Yes,
    No,
    #[default]
    Unknown,
}

impl ExistingConditions {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExistingConditions::Yes => "yes",
            ExistingConditions::No => "no",
            ExistingConditions::Unknown => "unknown",
        }
    }
}

impl FromStr for ExistingConditions {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "yes" => Ok(ExistingConditions::Yes),
            "no" => Ok(ExistingConditions::No),
            "unknown" => Ok(ExistingConditions::Unknown),
            other => Err(ValidationError::UnknownConditions(other.to_owned())),
        }
    }
}

macro_rules! display_as_token {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_token!(
    AgeGroup,
    SymptomDuration,
    Severity,
    MedicineTaken,
    ExistingConditions
);

/// A validated assessment, ready for classification.
///
/// Symptom identifiers are opaque tokens: they are trimmed and deduplicated (first occurrence
/// wins, order preserved) but not checked against the taxonomy. At least one is required.
/// Deserializing goes through [`AssessmentInput::new`], so stored copies obey the same rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "StoredAssessment")]
pub struct AssessmentInput {
    symptoms: Vec<NonEmptyText>,
    age_group: AgeGroup,
    duration: SymptomDuration,
    severity: Severity,
    medicine: MedicineTaken,
}

impl AssessmentInput {
    /// # Errors
    ///
    /// Returns `ValidationError::EmptySymptoms` if `symptoms` is empty after deduplication.
    pub fn new(
        symptoms: impl IntoIterator<Item = NonEmptyText>,
        age_group: AgeGroup,
        duration: SymptomDuration,
        severity: Severity,
        medicine: MedicineTaken,
    ) -> Result<Self, ValidationError> {
        let mut seen = HashSet::new();
        let symptoms: Vec<NonEmptyText> = symptoms
            .into_iter()
            .filter(|s| seen.insert(s.as_str().to_owned()))
            .collect();

        if symptoms.is_empty() {
            return Err(ValidationError::EmptySymptoms);
        }

        Ok(Self {
            symptoms,
            age_group,
            duration,
            severity,
            medicine,
        })
    }

    pub fn symptoms(&self) -> &[NonEmptyText] {
        &self.symptoms
    }

    pub fn age_group(&self) -> AgeGroup {
        self.age_group
    }

    pub fn duration(&self) -> SymptomDuration {
        self.duration
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn medicine(&self) -> MedicineTaken {
        self.medicine
    }

    /// Same assessment with a different severity.
    pub fn with_severity(&self, severity: Severity) -> Self {
        Self {
            severity,
            ..self.clone()
        }
    }
}

/// Serialized shape of [`AssessmentInput`] before its invariants are checked.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredAssessment {
    symptoms: Vec<NonEmptyText>,
    age_group: AgeGroup,
    duration: SymptomDuration,
    severity: Severity,
    medicine: MedicineTaken,
}

impl TryFrom<StoredAssessment> for AssessmentInput {
    type Error = ValidationError;

    fn try_from(stored: StoredAssessment) -> Result<Self, Self::Error> {
        AssessmentInput::new(
            stored.symptoms,
            stored.age_group,
            stored.duration,
            stored.severity,
            stored.medicine,
        )
    }
}

/// Assessment fields as raw text, exactly as collected by an intake form or CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAssessment {
    pub symptoms: Vec<String>,
    pub age_group: String,
    pub duration: String,
    pub severity: String,
    pub medicine: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> NonEmptyText {
        NonEmptyText::new(s).unwrap()
    }

    #[test]
    fn test_tokens_round_trip_through_from_str() {
        for age in [
            AgeGroup::Below18,
            AgeGroup::From18To40,
            AgeGroup::From41To60,
            AgeGroup::Above60,
        ] {
            assert_eq!(age.as_str().parse::<AgeGroup>().unwrap(), age);
        }
        for severity in Severity::ALL {
            assert_eq!(severity.to_string().parse::<Severity>().unwrap(), severity);
        }
    }

    #[test]
    fn test_unknown_tokens_are_rejected_not_coerced() {
        assert_eq!(
            "ancient".parse::<AgeGroup>().unwrap_err(),
            ValidationError::UnknownAgeGroup("ancient".into())
        );
        assert!(matches!(
            "forever".parse::<SymptomDuration>(),
            Err(ValidationError::UnknownDuration(_))
        ));
        assert!(matches!(
            "MILD".parse::<Severity>(),
            Err(ValidationError::UnknownSeverity(_))
        ));
        assert!(matches!(
            "aspirin".parse::<MedicineTaken>(),
            Err(ValidationError::UnknownMedicine(_))
        ));
    }

    #[test]
    fn test_common_otc_alias() {
        assert_eq!(
            "common-otc".parse::<MedicineTaken>().unwrap(),
            MedicineTaken::CommonOtc
        );
        let parsed: MedicineTaken = serde_json::from_str("\"common-otc\"").unwrap();
        assert_eq!(parsed, MedicineTaken::CommonOtc);
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"paracetamol\"");
    }

    #[test]
    fn test_serde_uses_wire_tokens() {
        assert_eq!(
            serde_json::to_string(&SymptomDuration::MoreThanFiveDays).unwrap(),
            "\"more5\""
        );
        assert_eq!(
            serde_json::to_string(&AgeGroup::From18To40).unwrap(),
            "\"18-40\""
        );
    }

    #[test]
    fn test_severity_is_ordered() {
        assert!(Severity::Mild < Severity::Moderate);
        assert!(Severity::Moderate < Severity::Severe);
    }

    #[test]
    fn test_input_deduplicates_symptoms_preserving_order() {
        let input = AssessmentInput::new(
            [text("cough"), text("fever"), text("cough")],
            AgeGroup::From18To40,
            SymptomDuration::Today,
            Severity::Mild,
            MedicineTaken::NotTaken,
        )
        .unwrap();

        let ids: Vec<&str> = input.symptoms().iter().map(|s| s.as_str()).collect();
        assert_eq!(ids, vec!["cough", "fever"]);
    }

    #[test]
    fn test_input_rejects_empty_symptoms() {
        let result = AssessmentInput::new(
            Vec::new(),
            AgeGroup::From18To40,
            SymptomDuration::Today,
            Severity::Mild,
            MedicineTaken::NotTaken,
        );

        assert_eq!(result.unwrap_err(), ValidationError::EmptySymptoms);
    }

    #[test]
    fn test_deserialize_enforces_input_rules() {
        let empty = serde_json::json!({
            "symptoms": [],
            "ageGroup": "18-40",
            "duration": "today",
            "severity": "mild",
            "medicine": "none"
        });
        let err = serde_json::from_value::<AssessmentInput>(empty).unwrap_err();
        assert!(err.to_string().contains("symptom"), "unexpected error: {err}");

        let repeated = serde_json::json!({
            "symptoms": ["fever", "fever", "cough"],
            "ageGroup": "18-40",
            "duration": "today",
            "severity": "mild",
            "medicine": "none"
        });
        let input: AssessmentInput = serde_json::from_value(repeated).unwrap();
        let ids: Vec<&str> = input.symptoms().iter().map(|s| s.as_str()).collect();
        assert_eq!(ids, vec!["fever", "cough"]);
    }
}
