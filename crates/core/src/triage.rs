//! Triage classification engine.
//!
//! Maps an [`AssessmentInput`] to a [`TriageResult`]: a risk tier, the symptom groups that were
//! detected and a canned rationale per supported locale.
//!
//! Classification is a pure function of the input, the taxonomy and the scoring rules. It does
//! no I/O, keeps no state and cannot fail on a validated input.
//!
//! ## Algorithm
//!
//! 1. Detect every group whose member set intersects the reported symptoms.
//! 2. If any detected group is an override group, the tier is HIGH. Nothing else is scored.
//! 3. Otherwise sum the priority of each detected group plus the context weights (severity,
//!    age group, duration, medicine-with-non-mild-severity, many symptoms).
//! 4. Score at or above the high threshold is HIGH, at or above the medium threshold MEDIUM,
//!    anything else LOW.
//!
//! Unknown symptom identifiers match no group but still count toward the many-symptoms bonus.

use crate::assessment::{AssessmentInput, MedicineTaken, Severity, SymptomDuration};
use crate::constants::{
    DURATION_3_5_DAYS_WEIGHT, DURATION_OVER_5_DAYS_WEIGHT, HIGH_RISK_THRESHOLD,
    MANY_SYMPTOMS_COUNT, MANY_SYMPTOMS_WEIGHT, MEDICATED_NOT_MILD_WEIGHT, MEDIUM_RISK_THRESHOLD,
    MODERATE_WEIGHT, SEVERE_WEIGHT, VULNERABLE_AGE_WEIGHT,
};
use crate::error::ValidationError;
use crate::taxonomy::SymptomTaxonomy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use swasth_types::LocalizedText;

/// Ordinal risk tier. `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "LOW",
            RiskTier::Medium => "MEDIUM",
            RiskTier::High => "HIGH",
        }
    }

    /// Canned explanation for a tier reached by scoring.
    pub fn rationale(&self) -> LocalizedText {
        match self {
            RiskTier::Low => LocalizedText::new(
                "Symptoms appear mild and manageable with home care.",
                "लक्षण हल्के हैं और घरेलू देखभाल से संभाले जा सकते हैं।",
            ),
            RiskTier::Medium => LocalizedText::new(
                "Multiple symptoms detected. Monitoring is advised.",
                "कई लक्षण पाए गए हैं। निगरानी आवश्यक है।",
            ),
            RiskTier::High => LocalizedText::new(
                "Symptoms indicate higher risk. Medical consultation advised.",
                "लक्षण उच्च जोखिम दर्शाते हैं। डॉक्टर से सलाह लें।",
            ),
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskTier {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "LOW" => Ok(RiskTier::Low),
            "MEDIUM" => Ok(RiskTier::Medium),
            "HIGH" => Ok(RiskTier::High),
            other => Err(ValidationError::UnknownRiskTier(other.to_owned())),
        }
    }
}

/// Explanation used whenever an override group forces the HIGH tier.
pub fn override_rationale() -> LocalizedText {
    LocalizedText::new(
        "Breathing or neurological symptoms need urgent medical attention.",
        "सांस या तंत्रिका संबंधी लक्षणों पर तुरंत डॉक्टर से संपर्क करें।",
    )
}

/// Outcome of classifying one assessment. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageResult {
    pub tier: RiskTier,
    /// Detected group ids, in taxonomy order.
    pub matched_groups: Vec<String>,
    pub rationale: LocalizedText,
    /// Override group that forced the tier, if the override rule fired.
    pub overridden_by: Option<String>,
    /// Accumulated score, if the tier was reached by scoring.
    pub score: Option<u32>,
}

/// Weights and thresholds used when no override fires.
///
/// `Default` holds the reference values; changing them changes classification output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringRules {
    pub high_threshold: u32,
    pub medium_threshold: u32,
    pub severe_weight: u32,
    pub moderate_weight: u32,
    pub vulnerable_age_weight: u32,
    pub duration_3_5_days_weight: u32,
    pub duration_over_5_days_weight: u32,
    pub medicated_not_mild_weight: u32,
    pub many_symptoms_weight: u32,
    pub many_symptoms_count: usize,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            high_threshold: HIGH_RISK_THRESHOLD,
            medium_threshold: MEDIUM_RISK_THRESHOLD,
            severe_weight: SEVERE_WEIGHT,
            moderate_weight: MODERATE_WEIGHT,
            vulnerable_age_weight: VULNERABLE_AGE_WEIGHT,
            duration_3_5_days_weight: DURATION_3_5_DAYS_WEIGHT,
            duration_over_5_days_weight: DURATION_OVER_5_DAYS_WEIGHT,
            medicated_not_mild_weight: MEDICATED_NOT_MILD_WEIGHT,
            many_symptoms_weight: MANY_SYMPTOMS_WEIGHT,
            many_symptoms_count: MANY_SYMPTOMS_COUNT,
        }
    }
}

impl ScoringRules {
    fn tier_for(&self, score: u32) -> RiskTier {
        if score >= self.high_threshold {
            RiskTier::High
        } else if score >= self.medium_threshold {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }

    fn context_score(&self, input: &AssessmentInput) -> u32 {
        let mut score = match input.severity() {
            Severity::Severe => self.severe_weight,
            Severity::Moderate => self.moderate_weight,
            Severity::Mild => 0,
        };

        if input.age_group().is_vulnerable() {
            score = score.saturating_add(self.vulnerable_age_weight);
        }

        score = score.saturating_add(match input.duration() {
            SymptomDuration::ThreeToFiveDays => self.duration_3_5_days_weight,
            SymptomDuration::MoreThanFiveDays => self.duration_over_5_days_weight,
            SymptomDuration::Today | SymptomDuration::OneToTwoDays => 0,
        });

        if input.medicine() != MedicineTaken::NotTaken && input.severity() != Severity::Mild {
            score = score.saturating_add(self.medicated_not_mild_weight);
        }

        // Counts every distinct reported symptom, including ones the taxonomy does not know.
        if input.symptoms().len() >= self.many_symptoms_count {
            score = score.saturating_add(self.many_symptoms_weight);
        }

        score
    }
}

/// Classifies assessments against a taxonomy and a set of scoring rules.
#[derive(Debug, Clone)]
pub struct TriageEngine {
    taxonomy: Arc<SymptomTaxonomy>,
    rules: ScoringRules,
}

impl Default for TriageEngine {
    fn default() -> Self {
        Self::new(
            Arc::new(SymptomTaxonomy::builtin().clone()),
            ScoringRules::default(),
        )
    }
}

impl TriageEngine {
    pub fn new(taxonomy: Arc<SymptomTaxonomy>, rules: ScoringRules) -> Self {
        Self { taxonomy, rules }
    }

    pub fn taxonomy(&self) -> &SymptomTaxonomy {
        &self.taxonomy
    }

    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    /// Classifies one assessment.
    pub fn classify(&self, input: &AssessmentInput) -> TriageResult {
        let detected = self.taxonomy.detect(input.symptoms());
        let matched_groups: Vec<String> = detected.iter().map(|g| g.id.clone()).collect();

        if let Some(group) = detected.iter().find(|g| g.is_override) {
            return TriageResult {
                tier: RiskTier::High,
                matched_groups,
                rationale: override_rationale(),
                overridden_by: Some(group.id.clone()),
                score: None,
            };
        }

        // Priorities come from a possibly user-supplied taxonomy; saturate instead of wrapping.
        let score = detected
            .iter()
            .fold(self.rules.context_score(input), |acc, g| {
                acc.saturating_add(g.priority)
            });
        let tier = self.rules.tier_for(score);

        TriageResult {
            tier,
            matched_groups,
            rationale: tier.rationale(),
            overridden_by: None,
            score: Some(score),
        }
    }
}

/// Classifies with the built-in taxonomy and default scoring rules.
pub fn classify(input: &AssessmentInput) -> TriageResult {
    static DEFAULT_ENGINE: OnceLock<TriageEngine> = OnceLock::new();
    DEFAULT_ENGINE
        .get_or_init(TriageEngine::default)
        .classify(input)
}
