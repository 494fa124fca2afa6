//! Delivery of cases to the review backend.
//!
//! [`CaseBackend`] is the seam between the submission pipeline and the network. The pipeline
//! only needs one operation, "create this case and tell me its id", and treats every failure
//! the same way (fall back to the queue), so [`DeliveryError`] is never surfaced to callers of
//! submit or reconcile.

use crate::constants::{CASES_ENDPOINT, DEFAULT_ATTEMPT_TIMEOUT};
use crate::error::{CoreError, CoreResult};
use api_shared::{CaseSubmission, CreateCaseRes};
use std::future::Future;
use std::time::Duration;
use swasth_uuid::BackendCaseId;

/// Positive acknowledgement of a delivered case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendAck {
    pub id: BackendCaseId,
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("delivery attempt timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("backend rejected the case with HTTP {status}")]
    Rejected { status: u16 },
    #[error("backend response could not be understood: {0}")]
    InvalidResponse(String),
}

/// Something that can accept a case for review.
pub trait CaseBackend: Send + Sync {
    /// Delivers one case. An `Ok` is a positive acknowledgement: the backend has stored the case
    /// under the returned id.
    fn create_case(
        &self,
        submission: &CaseSubmission,
    ) -> impl Future<Output = Result<BackendAck, DeliveryError>> + Send;
}

/// [`CaseBackend`] speaking JSON over HTTP to the review API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    cases_url: String,
    timeout: Duration,
}

impl HttpBackend {
    /// Creates a client for the backend at `base_url` using the default request timeout.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::HttpClient` if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> CoreResult<Self> {
        Self::with_timeout(base_url, DEFAULT_ATTEMPT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> CoreResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("swasth/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(CoreError::HttpClient)?;

        Ok(Self {
            http,
            cases_url: format!("{}{}", base_url.trim_end_matches('/'), CASES_ENDPOINT),
            timeout,
        })
    }

    pub fn cases_url(&self) -> &str {
        &self.cases_url
    }

    /// Per-request timeout applied by the HTTP client.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl CaseBackend for HttpBackend {
    async fn create_case(&self, submission: &CaseSubmission) -> Result<BackendAck, DeliveryError> {
        let response = self
            .http
            .post(&self.cases_url)
            .json(submission)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout(self.timeout)
                } else {
                    DeliveryError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
            });
        }

        let body: CreateCaseRes = response
            .json()
            .await
            .map_err(|e| DeliveryError::InvalidResponse(e.to_string()))?;
        let id = BackendCaseId::parse(&body.id)
            .map_err(|e| DeliveryError::InvalidResponse(e.to_string()))?;

        tracing::debug!(case_id = %id, "backend acknowledged case");
        Ok(BackendAck { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cases_url_joins_base_and_endpoint() {
        let backend = HttpBackend::new("http://localhost:8000/").unwrap();
        assert_eq!(backend.cases_url(), "http://localhost:8000/api/cases");

        let backend = HttpBackend::new("https://review.example.org").unwrap();
        assert_eq!(backend.cases_url(), "https://review.example.org/api/cases");
    }

    fn submission() -> CaseSubmission {
        CaseSubmission {
            symptoms: vec!["fever".into()],
            age_group: "18-40".into(),
            duration: "today".into(),
            severity: "mild".into(),
            conditions: "unknown".into(),
            medicine: "none".into(),
            risk_level: "LOW".into(),
            matched_groups: vec!["fever".into()],
            reasoning_en: String::new(),
            reasoning_hi: String::new(),
            mode: "online".into(),
            local_id: None,
            created_at: None,
        }
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_a_transport_failure() {
        // Port 9 (discard) on localhost is not expected to run an HTTP server.
        let backend =
            HttpBackend::with_timeout("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();

        let err = backend.create_case(&submission()).await.unwrap_err();
        assert!(matches!(
            err,
            DeliveryError::Transport(_) | DeliveryError::Timeout(_)
        ));
    }

    #[tokio::test]
    async fn test_timeout_reports_the_configured_duration() {
        // Accepts connections but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let timeout = Duration::from_millis(200);
        let backend = HttpBackend::with_timeout(&format!("http://{addr}"), timeout).unwrap();
        assert_eq!(backend.timeout(), timeout);

        let err = backend.create_case(&submission()).await.unwrap_err();
        match err {
            DeliveryError::Timeout(reported) => assert_eq!(reported, timeout),
            other => panic!("expected a timeout, got {other:?}"),
        }
    }
}
