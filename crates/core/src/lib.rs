//! # Swasth Core
//!
//! Core logic for Swasth symptom triage and offline-tolerant case submission.
//!
//! This crate contains:
//! - the symptom taxonomy and the deterministic [`TriageEngine`],
//! - closed option types and validation at the assessment boundary,
//! - [`Case`] records and the [`CaseBuilder`],
//! - the [`SubmissionPipeline`]: deliver a case now or queue it durably and reconcile later,
//! - the review backend's file-backed [`ReviewRepository`].
//!
//! **No API concerns**: HTTP routing, OpenAPI documents and command-line handling belong in
//! `api-rest` and `swasth-cli`. The wire types shared by both sides live in `api-shared`.

pub mod assessment;
pub mod backend;
pub mod case;
pub mod config;
pub mod constants;
pub mod error;
pub mod queue;
pub mod repositories;
pub mod store;
pub mod submission;
pub mod taxonomy;
pub mod triage;
pub mod validation;

pub use assessment::{
    AgeGroup, AssessmentInput, ExistingConditions, MedicineTaken, RawAssessment, Severity,
    SymptomDuration,
};
pub use backend::{BackendAck, CaseBackend, DeliveryError, HttpBackend};
pub use case::{Case, CaseBuilder, ReviewAnnotation, SubmissionMode, SyncStatus};
pub use config::{ClientConfig, ServerConfig};
pub use error::{CoreError, CoreResult, ValidationError};
pub use queue::{PendingQueue, QueueSnapshot, QueuedCase};
pub use repositories::{CaseStatusFilter, CreatedCase, ReviewRepository};
pub use store::{DurableStore, FileStore, MemoryStore};
pub use submission::{
    ReconcileReport, SubmissionError, SubmissionOutcome, SubmissionPipeline,
};
pub use taxonomy::{SymptomGroup, SymptomTaxonomy};
pub use triage::{classify, RiskTier, ScoringRules, TriageEngine, TriageResult};
pub use validation::{parse_symptom_list, validate_assessment};

// Re-export so binaries need not depend on the leaf crates for common types.
pub use swasth_types::{Locale, LocalizedText, NonEmptyText};
pub use swasth_uuid::{BackendCaseId, CaseId, OfflineCaseId};
