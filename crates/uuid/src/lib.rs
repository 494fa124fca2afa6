//! Case identifier utilities.
//!
//! Every case record carries exactly one identifier, and the identifier tells you where it was
//! allocated:
//!
//! - **Backend identifiers** are assigned by the review backend on receipt:
//!   `CASE-` followed by 8 uppercase hex characters (for example `CASE-3F9A1C2B`).
//! - **Offline identifiers** are allocated on the device when a case could not be delivered:
//!   `OFFLINE-YYYYMMDDTHHMMSS.mmmZ-<canonical_uuid>`
//!   (for example `OFFLINE-20261017T143522.045Z-550e8400e29b41d4a716446655440000`).
//!
//! The reserved prefixes keep the two namespaces disjoint, so a caller can always tell whether
//! a case has been acknowledged by the backend by looking at its identifier alone.
//!
//! ## Canonical UUID form
//! Offline identifiers embed a UUID in canonical form: 32 lowercase hex characters, no hyphens.
//! This is the same value you would get from `Uuid::new_v4().simple().to_string()`.
//! The random component makes cross-device collisions negligible even though no server-side
//! check happens before reconciliation.

mod service;

// Re-export public types
pub use service::{BackendCaseId, CaseId, OfflineCaseId, Uuid, UuidService};

/// Prefix reserved for identifiers assigned by the review backend.
pub const BACKEND_ID_PREFIX: &str = "CASE-";

/// Prefix reserved for identifiers allocated locally while offline.
pub const OFFLINE_ID_PREFIX: &str = "OFFLINE-";

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
