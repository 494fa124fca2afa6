use crate::wire::HealthRes;
use crate::API_VERSION;
use chrono::Utc;

/// Simple health service used by the REST API.
///
/// This service provides a standardised way to report the health status of the review backend.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    /// Creates a new instance of HealthService.
    pub fn new() -> Self {
        Self
    }

    /// Builds a healthy status report.
    ///
    /// # Arguments
    /// * `case_count` - Number of cases currently held by the backend
    ///
    /// # Returns
    /// A `HealthRes` indicating the service is healthy.
    pub fn check_health(case_count: u64) -> HealthRes {
        HealthRes {
            status: "healthy".into(),
            timestamp: Utc::now(),
            case_count,
            version: API_VERSION.into(),
        }
    }
}
