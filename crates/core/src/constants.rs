//! Constants used throughout the Swasth core crate.
//!
//! Storage keys, directory names, defaults and the triage scoring constants live here so that
//! the values every component depends on are defined exactly once.

use std::time::Duration;

/// Store key holding the pending queue document.
pub const PENDING_QUEUE_KEY: &str = "swasth-pending";

/// Default directory for the device-side durable store.
pub const DEFAULT_QUEUE_DIR: &str = "swasth_queue";

/// Default directory for backend case storage.
pub const DEFAULT_DATA_DIR: &str = "swasth_data";

/// Directory (under the backend data directory) holding one JSON file per case.
pub const CASES_DIR_NAME: &str = "cases";

/// Default review backend base URL.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Path of the create-case endpoint, relative to the backend base URL.
pub const CASES_ENDPOINT: &str = "/api/cases";

/// Bound on a single delivery attempt.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Number of failed deliveries after which a queued case is reported as stuck.
pub const DEFAULT_ALERT_AFTER_ATTEMPTS: u32 = 10;

/// Upper bound on optimistic read-modify-write retries for the pending queue.
pub const MAX_QUEUE_CAS_ATTEMPTS: u32 = 64;

/// Embedded default symptom taxonomy.
pub const DEFAULT_TAXONOMY_YAML: &str = include_str!("../data/symptom_groups.yaml");

// Triage scoring constants. Changing any of these changes classification output.

/// Score at or above which a case is HIGH risk.
pub const HIGH_RISK_THRESHOLD: u32 = 7;
/// Score at or above which a case is MEDIUM risk.
pub const MEDIUM_RISK_THRESHOLD: u32 = 4;
pub const SEVERE_WEIGHT: u32 = 3;
pub const MODERATE_WEIGHT: u32 = 1;
/// Applied for the `below18` and `above60` age groups.
pub const VULNERABLE_AGE_WEIGHT: u32 = 1;
pub const DURATION_3_5_DAYS_WEIGHT: u32 = 1;
pub const DURATION_OVER_5_DAYS_WEIGHT: u32 = 2;
/// Applied when medicine was taken and severity is not mild.
pub const MEDICATED_NOT_MILD_WEIGHT: u32 = 1;
/// Applied when at least [`MANY_SYMPTOMS_COUNT`] symptoms were reported.
pub const MANY_SYMPTOMS_WEIGHT: u32 = 1;
pub const MANY_SYMPTOMS_COUNT: usize = 5;

/// Number of symptoms returned by the trends report.
pub const TREND_TOP_N: usize = 10;
/// Percentage change beyond which a symptom is trending up or down.
pub const TREND_STABLE_BAND_PERCENT: f64 = 5.0;

/// Reporting window used by the trends report when none is requested.
pub const DEFAULT_TREND_DAYS: u32 = 7;
