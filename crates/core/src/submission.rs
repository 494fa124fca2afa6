//! Submission pipeline: deliver now, or save offline and deliver later.
//!
//! `submit` makes exactly one bounded delivery attempt. If it fails for any reason the case is
//! given an offline id and appended to the [`PendingQueue`], and the caller gets
//! [`SubmissionOutcome::Queued`] back instead of an error. `reconcile` later walks the queue in
//! enqueue order and retries each case once.
//!
//! Queued cases are retried on every reconcile without backoff and never dead-lettered. Each
//! entry records its attempt count and last error, and once the count reaches
//! `alert_after_attempts` every further failure is logged at `warn` so an operator can step in.
//!
//! Queue reads and writes run on tokio's blocking pool: the store does synchronous file I/O and
//! may wait on another writer's lock file.

use crate::backend::{BackendAck, CaseBackend, DeliveryError};
use crate::case::{Case, SubmissionMode, SyncStatus};
use crate::config::ClientConfig;
use crate::constants::{DEFAULT_ALERT_AFTER_ATTEMPTS, DEFAULT_ATTEMPT_TIMEOUT};
use crate::error::{CoreError, CoreResult};
use crate::queue::{PendingQueue, QueuedCase, Settlement};
use api_shared::CaseSubmission;
use chrono::Utc;
use std::sync::Mutex;
use std::time::Duration;
use swasth_uuid::{BackendCaseId, CaseId, OfflineCaseId};

/// Result of [`SubmissionPipeline::submit`].
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    /// The backend acknowledged the case.
    Delivered { id: BackendCaseId, case: Case },
    /// Delivery failed; the case is saved in the pending queue.
    Queued {
        id: OfflineCaseId,
        case: Case,
        reason: String,
    },
}

impl SubmissionOutcome {
    pub fn id(&self) -> CaseId {
        match self {
            SubmissionOutcome::Delivered { id, .. } => id.clone().into(),
            SubmissionOutcome::Queued { id, .. } => id.clone().into(),
        }
    }

    pub fn case(&self) -> &Case {
        match self {
            SubmissionOutcome::Delivered { case, .. } | SubmissionOutcome::Queued { case, .. } => {
                case
            }
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, SubmissionOutcome::Queued { .. })
    }
}

/// A case that could neither be delivered nor saved to the pending queue.
///
/// The case comes back to the caller, already carrying its offline id, so it can be kept in
/// memory and submitted again.
#[derive(Debug, thiserror::Error)]
#[error("case {id} could not be saved offline: {source}", id = case_label(.case))]
pub struct SubmissionError {
    pub case: Box<Case>,
    pub source: CoreError,
}

impl SubmissionError {
    pub fn into_case(self) -> Case {
        *self.case
    }
}

fn case_label(case: &Case) -> String {
    case.id
        .as_ref()
        .map_or_else(|| "(unassigned)".to_owned(), ToString::to_string)
}

/// Summary of one reconcile pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Cases acknowledged this round.
    pub synced: usize,
    /// Cases left in the queue afterwards, including any appended during the pass.
    pub still_pending: usize,
    /// Unreadable entries moved out of the queue.
    pub dropped: usize,
    /// Offline id and backend id of each case acknowledged this round.
    pub delivered: Vec<(CaseId, BackendCaseId)>,
}

pub struct SubmissionPipeline<B> {
    backend: B,
    queue: PendingQueue,
    attempt_timeout: Duration,
    alert_after_attempts: u32,
    last_offline_id: Mutex<Option<OfflineCaseId>>,
    reconciling: tokio::sync::Mutex<()>,
}

impl<B: CaseBackend> SubmissionPipeline<B> {
    pub fn new(backend: B, queue: PendingQueue) -> Self {
        Self {
            backend,
            queue,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            alert_after_attempts: DEFAULT_ALERT_AFTER_ATTEMPTS,
            last_offline_id: Mutex::new(None),
            reconciling: tokio::sync::Mutex::new(()),
        }
    }

    pub fn from_config(backend: B, queue: PendingQueue, config: &ClientConfig) -> Self {
        Self::new(backend, queue)
            .with_attempt_timeout(config.attempt_timeout())
            .with_alert_after_attempts(config.alert_after_attempts())
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_alert_after_attempts(mut self, attempts: u32) -> Self {
        self.alert_after_attempts = attempts;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    /// Cases currently waiting for delivery, in enqueue order.
    pub async fn pending(&self) -> CoreResult<Vec<QueuedCase>> {
        Ok(self.with_queue(|queue| queue.load()).await?.entries)
    }

    /// Submits a case, falling back to the pending queue if delivery fails.
    ///
    /// # Errors
    ///
    /// Delivery failures become [`SubmissionOutcome::Queued`]. A [`SubmissionError`] is returned
    /// only when the pending queue cannot be written either; it hands the case back.
    pub async fn submit(&self, mut case: Case) -> Result<SubmissionOutcome, SubmissionError> {
        let submission = case.to_submission();

        match self.deliver(&submission).await {
            Ok(ack) => {
                case.id = Some(ack.id.clone().into());
                case.sync_status = SyncStatus::Synced;
                tracing::info!(case_id = %ack.id, tier = %case.triage.tier, "case delivered");
                Ok(SubmissionOutcome::Delivered { id: ack.id, case })
            }
            Err(err) => {
                let id = self.next_offline_id();
                tracing::warn!(case_id = %id, error = %err, "delivery failed; saving case offline");

                case.mode = SubmissionMode::Offline;
                case.sync_status = SyncStatus::Pending;
                let mut entry = QueuedCase::new(id.clone().into(), case, Utc::now());
                entry.last_error = Some(err.to_string());

                let queued = entry.clone();
                if let Err(source) = self.with_queue(move |queue| queue.enqueue(queued)).await {
                    tracing::error!(case_id = %id, error = %source, "case could not be saved offline");
                    return Err(SubmissionError {
                        case: Box::new(entry.case),
                        source,
                    });
                }

                Ok(SubmissionOutcome::Queued {
                    id,
                    case: entry.case,
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Retries every queued case once, sequentially in enqueue order.
    ///
    /// Acknowledged cases are removed from the queue and failed ones stay, with their attempt
    /// count and last error updated. Overlapping calls on the same pipeline run one at a time.
    ///
    /// # Errors
    ///
    /// Only local store failures are returned. If the queue cannot be updated after some cases
    /// were delivered, those cases stay queued and are re-sent with their `localId` next time.
    pub async fn reconcile(&self) -> CoreResult<ReconcileReport> {
        let _guard = self.reconciling.lock().await;

        let snapshot = self.with_queue(|queue| queue.load()).await?;
        let mut settlement = Settlement {
            corrupt: snapshot.corrupt.iter().map(|c| c.raw.clone()).collect(),
            ..Settlement::default()
        };
        let mut delivered = Vec::new();

        tracing::info!(
            queued = snapshot.entries.len(),
            corrupt = snapshot.corrupt.len(),
            "reconciling pending cases"
        );

        for entry in &snapshot.entries {
            let submission = entry.case.to_submission();
            match self.deliver(&submission).await {
                Ok(ack) => {
                    tracing::debug!(case_id = %entry.id, backend_id = %ack.id, "queued case delivered");
                    settlement.synced.push(entry.id.clone());
                    delivered.push((entry.id.clone(), ack.id));
                }
                Err(err) => {
                    let attempts = entry.attempts.saturating_add(1);
                    if attempts >= self.alert_after_attempts {
                        tracing::warn!(
                            case_id = %entry.id,
                            attempts,
                            error = %err,
                            "queued case still undelivered"
                        );
                    } else {
                        tracing::debug!(case_id = %entry.id, attempts, error = %err, "queued case delivery failed");
                    }
                    settlement.failed.push((entry.id.clone(), err.to_string()));
                }
            }
        }

        let synced = settlement.synced.len();
        let at = Utc::now();
        let summary = self
            .with_queue(move |queue| queue.settle(&settlement, at))
            .await?;
        let report = ReconcileReport {
            synced,
            still_pending: summary.remaining,
            dropped: summary.dropped,
            delivered,
        };

        tracing::info!(
            synced = report.synced,
            still_pending = report.still_pending,
            dropped = report.dropped,
            "reconcile finished"
        );
        Ok(report)
    }

    async fn deliver(&self, submission: &CaseSubmission) -> Result<BackendAck, DeliveryError> {
        match tokio::time::timeout(self.attempt_timeout, self.backend.create_case(submission)).await
        {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(self.attempt_timeout)),
        }
    }

    async fn with_queue<T, F>(&self, op: F) -> CoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&PendingQueue) -> CoreResult<T> + Send + 'static,
    {
        let queue = self.queue.clone();
        tokio::task::spawn_blocking(move || op(&queue))
            .await
            .map_err(|e| CoreError::StoreTask(e.to_string()))?
    }

    fn next_offline_id(&self) -> OfflineCaseId {
        let mut last = self
            .last_offline_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let id = OfflineCaseId::generate(last.as_ref());
        *last = Some(id.clone());
        id
    }
}
