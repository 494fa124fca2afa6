//! Case records and the builder that assembles them.
//!
//! A [`Case`] is the unit handed to the submission pipeline: a snapshot of the assessment, the
//! triage outcome, how it was submitted and where it stands in synchronisation. The builder is
//! the only place a case is created; afterwards only the pipeline changes its sync state and
//! only a review action attaches an annotation.

use crate::assessment::{AssessmentInput, ExistingConditions, RawAssessment};
use crate::error::{CoreResult, ValidationError};
use crate::triage::{TriageEngine, TriageResult};
use crate::validation::validate_assessment;
use api_shared::CaseSubmission;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use swasth_types::NonEmptyText;
use swasth_uuid::CaseId;

/// How the case reached (or will reach) the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionMode {
    Online,
    /// Recorded locally after a failed delivery; awaiting reconciliation.
    Offline,
}

impl SubmissionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionMode::Online => "online",
            SubmissionMode::Offline => "offline",
        }
    }
}

impl fmt::Display for SubmissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "online" => Ok(SubmissionMode::Online),
            "offline" => Ok(SubmissionMode::Offline),
            other => Err(ValidationError::UnknownMode(other.to_owned())),
        }
    }
}

/// Synchronisation state of a case.
///
/// A case is in the pending queue exactly while its status is `Pending` or `SyncFailed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
    /// Not yet acknowledged; no reconcile attempt has been made.
    Pending,
    /// Acknowledged by the backend. Terminal.
    Synced,
    /// Not yet acknowledged; at least one reconcile attempt failed.
    SyncFailed,
}

impl SyncStatus {
    pub fn is_awaiting_ack(&self) -> bool {
        !matches!(self, SyncStatus::Synced)
    }
}

/// Reviewer annotation attached to a case. A pure data update, never a re-triage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewAnnotation {
    pub comment: Option<NonEmptyText>,
    pub resolved: bool,
    pub reviewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Case {
    /// Assigned on submission: a backend id once delivered, an offline id while queued.
    pub id: Option<CaseId>,
    pub assessment: AssessmentInput,
    pub triage: TriageResult,
    #[serde(default)]
    pub existing_conditions: ExistingConditions,
    pub mode: SubmissionMode,
    pub created_at: DateTime<Utc>,
    pub sync_status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewAnnotation>,
}

impl Case {
    /// Attaches (or replaces) the reviewer annotation.
    pub fn annotate(&mut self, comment: Option<NonEmptyText>, resolved: bool, at: DateTime<Utc>) {
        self.review = Some(ReviewAnnotation {
            comment,
            resolved,
            reviewed_at: at,
        });
    }

    /// The create-case request for this case.
    ///
    /// A case that already carries an offline id sends it as `localId` so that the backend
    /// can recognise a re-delivery.
    pub fn to_submission(&self) -> CaseSubmission {
        let local_id = match &self.id {
            Some(id) if id.is_offline() => Some(id.to_string()),
            _ => None,
        };

        CaseSubmission {
            symptoms: self
                .assessment
                .symptoms()
                .iter()
                .map(|s| s.as_str().to_owned())
                .collect(),
            age_group: self.assessment.age_group().as_str().into(),
            duration: self.assessment.duration().as_str().into(),
            severity: self.assessment.severity().as_str().into(),
            conditions: self.existing_conditions.as_str().into(),
            medicine: self.assessment.medicine().as_str().into(),
            risk_level: self.triage.tier.as_str().into(),
            matched_groups: self.triage.matched_groups.clone(),
            reasoning_en: self.triage.rationale.en.clone(),
            reasoning_hi: self.triage.rationale.hi.clone(),
            mode: self.mode.as_str().into(),
            local_id,
            created_at: Some(self.created_at),
        }
    }
}

/// Assembles cases from assessments.
#[derive(Debug, Clone, Default)]
pub struct CaseBuilder {
    engine: TriageEngine,
}

impl CaseBuilder {
    pub fn new(engine: TriageEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &TriageEngine {
        &self.engine
    }

    /// Builds a case from an already classified assessment, stamped now.
    pub fn build(&self, input: AssessmentInput, triage: TriageResult) -> Case {
        self.build_at(input, triage, ExistingConditions::Unknown, Utc::now())
    }

    /// Builds a case with an explicit conditions answer and creation time.
    ///
    /// New cases start as online submissions with `Pending` status; the pipeline flips the
    /// mode if it has to fall back to the local queue.
    pub fn build_at(
        &self,
        input: AssessmentInput,
        triage: TriageResult,
        existing_conditions: ExistingConditions,
        created_at: DateTime<Utc>,
    ) -> Case {
        Case {
            id: None,
            assessment: input,
            triage,
            existing_conditions,
            mode: SubmissionMode::Online,
            created_at,
            sync_status: SyncStatus::Pending,
            review: None,
        }
    }

    /// Validates raw intake text, classifies it and builds the case.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if the raw assessment is malformed; nothing is
    /// classified in that case.
    pub fn assess(
        &self,
        raw: &RawAssessment,
        existing_conditions: ExistingConditions,
    ) -> CoreResult<Case> {
        let input = validate_assessment(raw)?;
        let triage = self.engine.classify(&input);
        tracing::debug!(tier = %triage.tier, groups = ?triage.matched_groups, "assessment classified");
        Ok(self.build_at(input, triage, existing_conditions, Utc::now()))
    }
}
