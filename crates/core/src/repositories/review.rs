//! Case storage for the review backend.
//!
//! Each accepted case is one JSON document:
//!
//! ```text
//! <data_dir>/
//!   cases/
//!     CASE-1A2B3C4D.json
//!     CASE-9F8E7D6C.json
//! ```
//!
//! Incoming submissions are validated against the closed option types before anything is
//! written, and stored with normalised tokens. A submission carrying a `localId` that is
//! already on file is treated as a re-delivery: the existing record is returned and nothing is
//! written.

use crate::assessment::{ExistingConditions, RawAssessment};
use crate::case::SubmissionMode;
use crate::config::ServerConfig;
use crate::constants::{TREND_STABLE_BAND_PERCENT, TREND_TOP_N};
use crate::error::{CoreError, CoreResult};
use crate::triage::RiskTier;
use crate::validation::validate_assessment;
use api_shared::{CaseRecord, CaseSubmission, EpidemicRes, SymptomTrend};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use swasth_uuid::BackendCaseId;
use tempfile::NamedTempFile;

/// Which cases a listing returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CaseStatusFilter {
    #[default]
    All,
    /// Not yet validated by a reviewer.
    Pending,
    Validated,
}

impl FromStr for CaseStatusFilter {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "all" => Ok(CaseStatusFilter::All),
            "pending" => Ok(CaseStatusFilter::Pending),
            "validated" => Ok(CaseStatusFilter::Validated),
            other => Err(CoreError::InvalidInput(format!(
                "unknown status filter '{other}' (expected all, pending or validated)"
            ))),
        }
    }
}

impl fmt::Display for CaseStatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CaseStatusFilter::All => "all",
            CaseStatusFilter::Pending => "pending",
            CaseStatusFilter::Validated => "validated",
        })
    }
}

/// Result of [`ReviewRepository::create`].
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedCase {
    pub record: CaseRecord,
    /// `false` when the submission was a re-delivery of a case already on file.
    pub newly_created: bool,
}

#[derive(Debug)]
pub struct ReviewRepository {
    cases_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl ReviewRepository {
    pub fn open(config: &ServerConfig) -> CoreResult<Self> {
        Self::open_dir(config.cases_dir())
    }

    /// Opens (creating if needed) a repository storing case files directly in `cases_dir`.
    pub fn open_dir(cases_dir: impl Into<PathBuf>) -> CoreResult<Self> {
        let cases_dir = cases_dir.into();
        fs::create_dir_all(&cases_dir).map_err(CoreError::StoreDirCreation)?;
        Ok(Self {
            cases_dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn cases_dir(&self) -> &Path {
        &self.cases_dir
    }

    /// Validates and stores a submitted case.
    ///
    /// # Errors
    ///
    /// - `CoreError::Validation` if any option token, the risk level, or the symptom list is
    ///   invalid,
    /// - `CoreError::FileWrite` / `Serialization` if the record cannot be written.
    pub fn create(&self, submission: CaseSubmission, now: DateTime<Utc>) -> CoreResult<CreatedCase> {
        let assessment = validate_assessment(&RawAssessment {
            symptoms: submission.symptoms,
            age_group: submission.age_group,
            duration: submission.duration,
            severity: submission.severity,
            medicine: submission.medicine,
        })?;
        let conditions: ExistingConditions = submission.conditions.parse()?;
        let risk_level: RiskTier = submission.risk_level.parse()?;
        let mode: SubmissionMode = submission.mode.parse()?;
        let local_id = submission
            .local_id
            .map(|id| id.trim().to_owned())
            .filter(|id| !id.is_empty());

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(local_id) = local_id.as_deref() {
            if let Some(existing) = self
                .read_all()?
                .into_iter()
                .find(|r| r.local_id.as_deref() == Some(local_id))
            {
                tracing::info!(case_id = %existing.id, local_id, "duplicate delivery of queued case");
                return Ok(CreatedCase {
                    record: existing,
                    newly_created: false,
                });
            }
        }

        let mut id = BackendCaseId::generate();
        while self.case_path(&id).exists() {
            id = BackendCaseId::generate();
        }

        let record = CaseRecord {
            id: id.to_string(),
            symptoms: assessment
                .symptoms()
                .iter()
                .map(|s| s.as_str().to_owned())
                .collect(),
            age_group: assessment.age_group().as_str().into(),
            duration: assessment.duration().as_str().into(),
            severity: assessment.severity().as_str().into(),
            conditions: conditions.as_str().into(),
            medicine: assessment.medicine().as_str().into(),
            risk_level: risk_level.as_str().into(),
            matched_groups: submission.matched_groups,
            reasoning_en: submission.reasoning_en,
            reasoning_hi: submission.reasoning_hi,
            mode: mode.as_str().into(),
            local_id,
            submitted_at: now,
            validated: false,
            validated_at: None,
            doctor_comment: None,
        };

        self.write_record(&id, &record)?;
        tracing::info!(case_id = %id, risk = %risk_level, mode = %mode, "case stored");

        Ok(CreatedCase {
            record,
            newly_created: true,
        })
    }

    /// Fetches one case.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::CaseNotFound` for unknown or malformed ids.
    pub fn get(&self, id: &str) -> CoreResult<CaseRecord> {
        let id = BackendCaseId::parse(id).map_err(|_| CoreError::CaseNotFound(id.to_owned()))?;
        self.read_record(&id)
    }

    /// Lists cases, newest first. Validated cases are ordered by validation time.
    pub fn list(&self, filter: CaseStatusFilter) -> CoreResult<Vec<CaseRecord>> {
        let mut records: Vec<CaseRecord> = self
            .read_all()?
            .into_iter()
            .filter(|r| match filter {
                CaseStatusFilter::All => true,
                CaseStatusFilter::Pending => !r.validated,
                CaseStatusFilter::Validated => r.validated,
            })
            .collect();

        match filter {
            CaseStatusFilter::Validated => {
                records.sort_by(|a, b| b.validated_at.cmp(&a.validated_at));
            }
            _ => records.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at)),
        }
        Ok(records)
    }

    /// Marks a case as validated by a reviewer, replacing any earlier comment.
    ///
    /// Only the review fields change; the triage outcome is stored as submitted.
    pub fn validate(
        &self,
        id: &str,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> CoreResult<CaseRecord> {
        let id = BackendCaseId::parse(id).map_err(|_| CoreError::CaseNotFound(id.to_owned()))?;

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut record = self.read_record(&id)?;

        record.validated = true;
        record.validated_at = Some(now);
        record.doctor_comment = comment
            .map(|c| c.trim().to_owned())
            .filter(|c| !c.is_empty());
        self.write_record(&id, &record)?;

        tracing::info!(case_id = %id, "case validated");
        Ok(record)
    }

    pub fn count(&self) -> CoreResult<u64> {
        Ok(self.read_all()?.len() as u64)
    }

    /// Symptom counts for the last `days` days compared with the `days` days before that.
    ///
    /// Returns the most reported symptoms (ties broken by symptom id). `changePercent` is
    /// relative to the previous count, or to 1 when the symptom was not reported before.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidInput` if `days` is zero.
    pub fn symptom_trends(&self, days: u32, now: DateTime<Utc>) -> CoreResult<EpidemicRes> {
        if days == 0 {
            return Err(CoreError::InvalidInput("days must be at least 1".into()));
        }

        let window = Duration::days(i64::from(days));
        let cutoff = now - window;
        let previous_cutoff = cutoff - window;

        let mut current: HashMap<String, u64> = HashMap::new();
        let mut previous: HashMap<String, u64> = HashMap::new();
        for record in self.read_all()? {
            let bucket = if record.submitted_at >= cutoff {
                &mut current
            } else if record.submitted_at >= previous_cutoff {
                &mut previous
            } else {
                continue;
            };
            for symptom in record.symptoms {
                *bucket.entry(symptom).or_default() += 1;
            }
        }

        let mut ranked: Vec<(String, u64)> = current.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(TREND_TOP_N);

        let symptoms = ranked
            .into_iter()
            .map(|(id, count)| {
                let previous_count = previous.get(&id).copied().unwrap_or(0);
                let change = (count as f64 - previous_count as f64)
                    / previous_count.max(1) as f64
                    * 100.0;
                let trend = if change > TREND_STABLE_BAND_PERCENT {
                    "up"
                } else if change < -TREND_STABLE_BAND_PERCENT {
                    "down"
                } else {
                    "stable"
                };
                SymptomTrend {
                    id,
                    count,
                    previous_count,
                    trend: trend.into(),
                    change_percent: (change * 10.0).round() / 10.0,
                }
            })
            .collect();

        Ok(EpidemicRes {
            symptoms,
            period_days: days,
        })
    }

    fn case_path(&self, id: &BackendCaseId) -> PathBuf {
        self.cases_dir.join(format!("{id}.json"))
    }

    fn read_record(&self, id: &BackendCaseId) -> CoreResult<CaseRecord> {
        let path = self.case_path(id);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CoreError::CaseNotFound(id.to_string()))
            }
            Err(e) => return Err(CoreError::FileRead(e)),
        };
        serde_json::from_str(&contents).map_err(CoreError::Deserialization)
    }

    fn write_record(&self, id: &BackendCaseId, record: &CaseRecord) -> CoreResult<()> {
        let json = serde_json::to_string_pretty(record).map_err(CoreError::Serialization)?;
        let mut tmp = NamedTempFile::new_in(&self.cases_dir).map_err(CoreError::FileWrite)?;
        tmp.write_all(json.as_bytes()).map_err(CoreError::FileWrite)?;
        tmp.persist(self.case_path(id))
            .map_err(|e| CoreError::FileWrite(e.error))?;
        Ok(())
    }

    /// Reads every case file. Unreadable files are logged and skipped.
    fn read_all(&self) -> CoreResult<Vec<CaseRecord>> {
        let mut records = Vec::new();

        for entry in fs::read_dir(&self.cases_dir).map_err(CoreError::FileRead)? {
            let path = entry.map_err(CoreError::FileRead)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match fs::read_to_string(&path)
                .map_err(CoreError::FileRead)
                .and_then(|c| serde_json::from_str::<CaseRecord>(&c).map_err(CoreError::Deserialization))
            {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable case file"),
            }
        }

        Ok(records)
    }
}
