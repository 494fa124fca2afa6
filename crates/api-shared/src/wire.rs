//! JSON wire types for the case API.
//!
//! Field names are camelCase on the wire. Option-like fields (age group, severity, ...) travel
//! as their string tokens; the backend validates them against the closed types in
//! `swasth-core` before storing anything.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Create-case request sent by the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CaseSubmission {
    pub symptoms: Vec<String>,
    pub age_group: String,
    pub duration: String,
    pub severity: String,
    /// `yes`, `no` or `unknown`.
    #[serde(default = "default_conditions")]
    pub conditions: String,
    pub medicine: String,
    pub risk_level: String,
    #[serde(default)]
    pub matched_groups: Vec<String>,
    pub reasoning_en: String,
    pub reasoning_hi: String,
    /// `online` or `offline`.
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Identifier allocated on the device when the case was queued offline.
    ///
    /// The backend uses it to recognise a re-delivered case.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<String>,
    /// When the assessment was taken on the device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_conditions() -> String {
    "unknown".into()
}

fn default_mode() -> String {
    "online".into()
}

/// Acknowledgement returned for an accepted case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCaseRes {
    pub id: String,
    pub status: String,
    #[schema(value_type = String, format = DateTime)]
    pub timestamp: DateTime<Utc>,
}

/// A case as stored and listed by the review backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CaseRecord {
    pub id: String,
    pub symptoms: Vec<String>,
    pub age_group: String,
    pub duration: String,
    pub severity: String,
    pub conditions: String,
    pub medicine: String,
    pub risk_level: String,
    #[serde(default)]
    pub matched_groups: Vec<String>,
    pub reasoning_en: String,
    pub reasoning_hi: String,
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<String>,
    #[schema(value_type = String, format = DateTime)]
    pub submitted_at: DateTime<Utc>,
    pub validated: bool,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub validated_at: Option<DateTime<Utc>>,
    pub doctor_comment: Option<String>,
}

/// Reviewer annotation for an existing case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ValidateCaseReq {
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCaseRes {
    pub id: String,
    pub validated: bool,
    #[schema(value_type = String, format = DateTime)]
    pub validated_at: DateTime<Utc>,
}

/// Per-symptom count for one reporting window compared with the window before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SymptomTrend {
    pub id: String,
    pub count: u64,
    pub previous_count: u64,
    /// `up`, `down` or `stable`.
    pub trend: String,
    pub change_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EpidemicRes {
    pub symptoms: Vec<SymptomTrend>,
    pub period_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthRes {
    pub status: String,
    #[schema(value_type = String, format = DateTime)]
    pub timestamp: DateTime<Utc>,
    pub case_count: u64,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}
