//! Durable pending queue of cases awaiting backend acknowledgement.
//!
//! The queue is one JSON document stored under a single key of a [`DurableStore`]:
//!
//! ```json
//! { "version": 7, "entries": [ { "id": "OFFLINE-...", "case": { ... }, "attempts": 2 } ] }
//! ```
//!
//! Entries are kept as raw JSON values so that one unreadable entry does not make the rest of
//! the queue unreadable; such entries surface as [`CorruptEntry`] and are moved aside (never
//! silently discarded) when the queue is settled.
//!
//! Every mutation is an optimistic read-modify-write: read the document, apply the change,
//! bump `version`, and `compare_and_swap` it back. A lost race is retried a bounded number of
//! times, so concurrent `enqueue` calls never lose each other's entries.

use crate::case::{Case, SyncStatus};
use crate::constants::{MAX_QUEUE_CAS_ATTEMPTS, PENDING_QUEUE_KEY};
use crate::error::{CoreError, CoreResult};
use crate::store::DurableStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use swasth_uuid::CaseId;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct QueueDocument {
    version: u64,
    #[serde(default)]
    entries: Vec<serde_json::Value>,
}

/// A case held in the queue, with its delivery history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedCase {
    pub id: CaseId,
    pub case: Case,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl QueuedCase {
    /// Wraps a case for queueing under `id`, stamping the id onto the case.
    pub fn new(id: CaseId, mut case: Case, enqueued_at: DateTime<Utc>) -> Self {
        case.id = Some(id.clone());
        Self {
            id,
            case,
            enqueued_at,
            attempts: 0,
            last_error: None,
            last_attempt_at: None,
        }
    }
}

/// A queue entry that could not be read as a [`QueuedCase`].
#[derive(Debug, Clone, PartialEq)]
pub struct CorruptEntry {
    pub raw: serde_json::Value,
    pub error: String,
}

/// Point-in-time view of the queue, in enqueue order.
#[derive(Debug, Clone, Default)]
pub struct QueueSnapshot {
    pub version: u64,
    pub entries: Vec<QueuedCase>,
    pub corrupt: Vec<CorruptEntry>,
}

/// Outcome of one reconcile pass, to be applied to the current queue.
#[derive(Debug, Clone, Default)]
pub struct Settlement {
    /// Acknowledged by the backend: removed.
    pub synced: Vec<CaseId>,
    /// Delivery failed: kept, with the error recorded.
    pub failed: Vec<(CaseId, String)>,
    /// Unreadable: moved aside.
    pub corrupt: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettleSummary {
    pub removed: usize,
    pub dropped: usize,
    pub remaining: usize,
}

#[derive(Clone)]
pub struct PendingQueue {
    store: Arc<dyn DurableStore>,
    key: String,
}

impl std::fmt::Debug for PendingQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingQueue").field("key", &self.key).finish()
    }
}

impl PendingQueue {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self::with_key(store, PENDING_QUEUE_KEY)
    }

    pub fn with_key(store: Arc<dyn DurableStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Reads the current queue.
    ///
    /// An unreadable document is moved aside and replaced by an empty queue.
    pub fn load(&self) -> CoreResult<QueueSnapshot> {
        let (raw, doc, recovered) = self.read()?;
        if recovered {
            let empty = serialize(&QueueDocument::default())?;
            // Losing this race just means another writer already replaced the document.
            let _ = self
                .store
                .compare_and_swap(&self.key, raw.as_deref(), &empty)?;
        }

        let mut snapshot = QueueSnapshot {
            version: doc.version,
            ..QueueSnapshot::default()
        };
        for raw in doc.entries {
            match serde_json::from_value::<QueuedCase>(raw.clone()) {
                Ok(entry) => snapshot.entries.push(entry),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable pending queue entry");
                    snapshot.corrupt.push(CorruptEntry {
                        raw,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(snapshot)
    }

    /// Number of entries (readable or not) currently queued.
    pub fn len(&self) -> CoreResult<usize> {
        let (_, doc, _) = self.read()?;
        Ok(doc.entries.len())
    }

    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Appends a case to the end of the queue.
    ///
    /// The entry's status is forced to an awaiting-acknowledgement state. Enqueueing an id
    /// that is already queued is a no-op.
    pub fn enqueue(&self, mut entry: QueuedCase) -> CoreResult<()> {
        if !entry.case.sync_status.is_awaiting_ack() {
            entry.case.sync_status = SyncStatus::Pending;
        }
        let value = serde_json::to_value(&entry).map_err(CoreError::Serialization)?;

        let appended = self.update(|doc| {
            if doc.entries.iter().any(|e| entry_id(e).as_ref() == Some(&entry.id)) {
                return false;
            }
            doc.entries.push(value.clone());
            true
        })?;

        if appended {
            tracing::info!(case_id = %entry.id, "case queued for later delivery");
        } else {
            tracing::debug!(case_id = %entry.id, "case already queued");
        }
        Ok(())
    }

    /// Applies a reconcile outcome to the *current* queue.
    ///
    /// Entries appended since the reconcile snapshot was taken are untouched. Corrupt entries
    /// are copied to a quarantine key before being removed.
    pub fn settle(&self, settlement: &Settlement, at: DateTime<Utc>) -> CoreResult<SettleSummary> {
        if !settlement.corrupt.is_empty() {
            let quarantine = self.quarantine_key(at);
            self.store
                .set(&quarantine, &serialize(&settlement.corrupt)?)?;
            tracing::warn!(
                count = settlement.corrupt.len(),
                quarantine_key = %quarantine,
                "moved unreadable pending queue entries aside"
            );
        }

        let failed: HashMap<&CaseId, &str> = settlement
            .failed
            .iter()
            .map(|(id, err)| (id, err.as_str()))
            .collect();

        self.update(|doc| {
            let mut summary = SettleSummary::default();
            let mut kept = Vec::with_capacity(doc.entries.len());

            for raw in doc.entries.drain(..) {
                if settlement.corrupt.contains(&raw) {
                    summary.dropped += 1;
                    continue;
                }

                let Ok(mut entry) = serde_json::from_value::<QueuedCase>(raw.clone()) else {
                    kept.push(raw);
                    continue;
                };

                if settlement.synced.contains(&entry.id) {
                    summary.removed += 1;
                    continue;
                }

                if let Some(error) = failed.get(&entry.id) {
                    entry.attempts = entry.attempts.saturating_add(1);
                    entry.last_error = Some((*error).to_owned());
                    entry.last_attempt_at = Some(at);
                    entry.case.sync_status = SyncStatus::SyncFailed;
                    match serde_json::to_value(&entry) {
                        Ok(updated) => kept.push(updated),
                        Err(_) => kept.push(raw),
                    }
                    continue;
                }

                kept.push(raw);
            }

            summary.remaining = kept.len();
            doc.entries = kept;
            summary
        })
    }

    fn read(&self) -> CoreResult<(Option<String>, QueueDocument, bool)> {
        let raw = self.store.get(&self.key)?;
        let Some(text) = raw.as_deref() else {
            return Ok((None, QueueDocument::default(), false));
        };

        match serde_json::from_str::<QueueDocument>(text) {
            Ok(doc) => Ok((raw, doc, false)),
            Err(e) => {
                let quarantine = self.quarantine_key(Utc::now());
                self.store.set(&quarantine, text)?;
                tracing::error!(
                    error = %e,
                    quarantine_key = %quarantine,
                    "pending queue document unreadable; moved aside"
                );
                Ok((raw, QueueDocument::default(), true))
            }
        }
    }

    fn update<T>(&self, mut apply: impl FnMut(&mut QueueDocument) -> T) -> CoreResult<T> {
        for attempt in 1..=MAX_QUEUE_CAS_ATTEMPTS {
            let (raw, mut doc, _) = self.read()?;
            let out = apply(&mut doc);
            doc.version += 1;
            let next = serialize(&doc)?;

            if self
                .store
                .compare_and_swap(&self.key, raw.as_deref(), &next)?
            {
                return Ok(out);
            }
            tracing::debug!(attempt, "pending queue changed concurrently; retrying");
            std::thread::yield_now();
        }

        Err(CoreError::QueueContention {
            attempts: MAX_QUEUE_CAS_ATTEMPTS,
        })
    }

    fn quarantine_key(&self, at: DateTime<Utc>) -> String {
        format!("{}-corrupt-{}", self.key, at.format("%Y%m%dT%H%M%S%3f"))
    }
}

fn entry_id(raw: &serde_json::Value) -> Option<CaseId> {
    raw.get("id")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
}

fn serialize<T: Serialize>(value: &T) -> CoreResult<String> {
    serde_json::to_string(value).map_err(CoreError::Serialization)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::{ExistingConditions, RawAssessment};
    use crate::case::CaseBuilder;
    use crate::store::{FileStore, MemoryStore};
    use swasth_uuid::OfflineCaseId;
    use tempfile::TempDir;

    fn queued(symptom: &str) -> QueuedCase {
        let case = CaseBuilder::default()
            .assess(
                &RawAssessment {
                    symptoms: vec![symptom.into()],
                    age_group: "18-40".into(),
                    duration: "today".into(),
                    severity: "mild".into(),
                    medicine: "none".into(),
                },
                ExistingConditions::Unknown,
            )
            .unwrap();
        QueuedCase::new(OfflineCaseId::generate(None).into(), case, Utc::now())
    }

    fn ids(snapshot: &QueueSnapshot) -> Vec<CaseId> {
        snapshot.entries.iter().map(|e| e.id.clone()).collect()
    }

    #[test]
    fn test_empty_store_loads_empty_queue() {
        let queue = PendingQueue::new(Arc::new(MemoryStore::new()));
        let snapshot = queue.load().unwrap();

        assert_eq!(snapshot.version, 0);
        assert!(snapshot.entries.is_empty());
        assert!(queue.is_empty().unwrap());
    }

    #[test]
    fn test_enqueue_preserves_order_and_bumps_version() {
        let queue = PendingQueue::new(Arc::new(MemoryStore::new()));
        let (a, b) = (queued("fever"), queued("cough"));

        queue.enqueue(a.clone()).unwrap();
        queue.enqueue(b.clone()).unwrap();
        let snapshot = queue.load().unwrap();

        assert_eq!(snapshot.version, 2);
        assert_eq!(ids(&snapshot), vec![a.id, b.id]);
        assert_eq!(snapshot.entries[0].case.sync_status, SyncStatus::Pending);
        assert_eq!(snapshot.entries[0].case.id, Some(snapshot.entries[0].id.clone()));
    }

    #[test]
    fn test_enqueue_same_id_twice_is_noop() {
        let queue = PendingQueue::new(Arc::new(MemoryStore::new()));
        let entry = queued("fever");

        queue.enqueue(entry.clone()).unwrap();
        queue.enqueue(entry).unwrap();

        assert_eq!(queue.len().unwrap(), 1);
    }

    #[test]
    fn test_settle_removes_synced_and_marks_failed() {
        let queue = PendingQueue::new(Arc::new(MemoryStore::new()));
        let (a, b, c) = (queued("fever"), queued("cough"), queued("cold"));
        for e in [&a, &b, &c] {
            queue.enqueue(e.clone()).unwrap();
        }

        let summary = queue
            .settle(
                &Settlement {
                    synced: vec![a.id.clone(), c.id.clone()],
                    failed: vec![(b.id.clone(), "HTTP 500".into())],
                    corrupt: vec![],
                },
                Utc::now(),
            )
            .unwrap();

        assert_eq!(
            summary,
            SettleSummary {
                removed: 2,
                dropped: 0,
                remaining: 1
            }
        );
        let snapshot = queue.load().unwrap();
        assert_eq!(ids(&snapshot), vec![b.id]);
        let left = &snapshot.entries[0];
        assert_eq!(left.attempts, 1);
        assert_eq!(left.last_error.as_deref(), Some("HTTP 500"));
        assert_eq!(left.case.sync_status, SyncStatus::SyncFailed);
    }

    #[test]
    fn test_settle_keeps_entries_added_after_snapshot() {
        let queue = PendingQueue::new(Arc::new(MemoryStore::new()));
        let first = queued("fever");
        queue.enqueue(first.clone()).unwrap();
        let _snapshot = queue.load().unwrap();

        let late = queued("cough");
        queue.enqueue(late.clone()).unwrap();
        queue
            .settle(
                &Settlement {
                    synced: vec![first.id],
                    ..Settlement::default()
                },
                Utc::now(),
            )
            .unwrap();

        assert_eq!(ids(&queue.load().unwrap()), vec![late.id]);
    }

    #[test]
    fn test_corrupt_entry_is_skipped_reported_and_quarantined() {
        let store = Arc::new(MemoryStore::new());
        let queue = PendingQueue::new(store.clone());
        let good = queued("fever");
        let good_value = serde_json::to_value(&good).unwrap();
        store
            .set(
                PENDING_QUEUE_KEY,
                &serde_json::json!({
                    "version": 3,
                    "entries": [{"id": "garbage"}, good_value]
                })
                .to_string(),
            )
            .unwrap();

        let snapshot = queue.load().unwrap();
        assert_eq!(ids(&snapshot), vec![good.id.clone()]);
        assert_eq!(snapshot.corrupt.len(), 1);

        let at = Utc::now();
        let summary = queue
            .settle(
                &Settlement {
                    corrupt: vec![snapshot.corrupt[0].raw.clone()],
                    ..Settlement::default()
                },
                at,
            )
            .unwrap();

        assert_eq!(summary.dropped, 1);
        assert_eq!(summary.remaining, 1);
        let quarantined = store
            .get(&format!(
                "{}-corrupt-{}",
                PENDING_QUEUE_KEY,
                at.format("%Y%m%dT%H%M%S%3f")
            ))
            .unwrap()
            .expect("corrupt entries should be kept aside");
        assert!(quarantined.contains("garbage"));
    }

    #[test]
    fn test_entry_with_no_symptoms_is_treated_as_corrupt() {
        let store = Arc::new(MemoryStore::new());
        let queue = PendingQueue::new(store.clone());
        let tampered = queued("fever");
        let kept = queued("cough");
        queue.enqueue(tampered.clone()).unwrap();
        queue.enqueue(kept.clone()).unwrap();

        let mut doc: serde_json::Value =
            serde_json::from_str(&store.get(PENDING_QUEUE_KEY).unwrap().unwrap()).unwrap();
        doc["entries"][0]["case"]["assessment"]["symptoms"] = serde_json::json!([]);
        store.set(PENDING_QUEUE_KEY, &doc.to_string()).unwrap();

        let snapshot = queue.load().unwrap();
        assert_eq!(ids(&snapshot), vec![kept.id.clone()]);
        assert_eq!(snapshot.corrupt.len(), 1);
        assert!(snapshot.corrupt[0].error.contains("symptom"));

        let at = Utc::now();
        let summary = queue
            .settle(
                &Settlement {
                    corrupt: vec![snapshot.corrupt[0].raw.clone()],
                    ..Settlement::default()
                },
                at,
            )
            .unwrap();

        assert_eq!(summary.dropped, 1);
        assert_eq!(summary.remaining, 1);
        assert!(store
            .get(&format!(
                "{}-corrupt-{}",
                PENDING_QUEUE_KEY,
                at.format("%Y%m%dT%H%M%S%3f")
            ))
            .unwrap()
            .is_some());
        assert_eq!(ids(&queue.load().unwrap()), vec![kept.id]);
    }

    #[test]
    fn test_unreadable_document_is_replaced_and_kept_aside() {
        let store = Arc::new(MemoryStore::new());
        store.set(PENDING_QUEUE_KEY, "not json at all").unwrap();
        let queue = PendingQueue::new(store.clone());

        let snapshot = queue.load().unwrap();
        assert!(snapshot.entries.is_empty());

        // The queue is usable again.
        queue.enqueue(queued("fever")).unwrap();
        assert_eq!(queue.len().unwrap(), 1);
    }

    #[test]
    fn test_concurrent_enqueues_are_not_lost() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store: Arc<dyn DurableStore> = Arc::new(FileStore::open(temp_dir.path()).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let queue = PendingQueue::new(store);
                    for _ in 0..5 {
                        queue.enqueue(queued("fever")).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = PendingQueue::new(store).load().unwrap();
        assert_eq!(snapshot.entries.len(), 20);
        assert_eq!(snapshot.version, 20);
    }
}
