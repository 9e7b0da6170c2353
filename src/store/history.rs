//! In-memory probe history.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use super::models::{ProbeBatch, ProbeResult};

/// Number of batches kept in the history ring.
pub const HISTORY_CAPACITY: usize = 100;

#[derive(Debug, Default)]
struct HistoryInner {
    latest: Option<ProbeBatch>,
    recent: VecDeque<ProbeBatch>,
}

/// Thread-safe, process-local store of the latest batch and a bounded history.
///
/// Both fields sit behind one mutex so readers never see a latest batch that
/// is missing from the history or vice versa.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    inner: Arc<Mutex<HistoryInner>>,
    capacity: usize,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(HistoryInner {
                latest: None,
                recent: VecDeque::with_capacity(capacity),
            })),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HistoryInner> {
        // A panicking writer cannot leave a torn batch behind, so the data is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the latest batch and append it to the history, evicting the oldest.
    pub fn record_batch(&self, batch: ProbeBatch) {
        let mut inner = self.lock();
        if inner.recent.len() >= self.capacity {
            inner.recent.pop_front();
        }
        inner.recent.push_back(batch.clone());
        inner.latest = Some(batch);
    }

    /// The most recently recorded batch, if any.
    pub fn latest(&self) -> Option<ProbeBatch> {
        self.lock().latest.clone()
    }

    /// Results of the latest batch, or an empty list before the first cycle.
    pub fn latest_results(&self) -> Vec<ProbeResult> {
        self.lock()
            .latest
            .as_ref()
            .map(|b| b.results.clone())
            .unwrap_or_default()
    }

    /// The bounded history, oldest first.
    pub fn history(&self) -> Vec<ProbeBatch> {
        self.lock().recent.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().recent.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ProbeStatus, ProbeResult};
    use chrono::{Duration, TimeZone, Utc};

    fn batch(seq: i64) -> ProbeBatch {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(seq);
        ProbeBatch::new(
            at,
            vec![ProbeResult {
                endpoint_name: format!("minio-{}", seq),
                url: "http://minio.local:9000/minio/health/live".to_string(),
                status: ProbeStatus::Healthy,
                status_code: Some(200),
                response_time_ms: 3,
                error_message: None,
                observed_at: at,
            }],
        )
    }

    #[test]
    fn test_empty_store() {
        let store = HistoryStore::new();
        assert!(store.latest().is_none());
        assert!(store.latest_results().is_empty());
        assert!(store.history().is_empty());
    }

    #[test]
    fn test_fifo_eviction_at_capacity() {
        let store = HistoryStore::new();
        for seq in 0..101 {
            store.record_batch(batch(seq));
        }

        let history = store.history();
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert!(!history.contains(&batch(0)));
        assert_eq!(history.first(), Some(&batch(1)));
        assert_eq!(history.last(), Some(&batch(100)));
        assert_eq!(store.latest(), Some(batch(100)));
    }

    #[test]
    fn test_latest_tracks_every_record() {
        let store = HistoryStore::with_capacity(3);
        for seq in 0..5 {
            store.record_batch(batch(seq));
            assert_eq!(store.latest(), Some(batch(seq)));
        }
        assert_eq!(store.len(), 3);
        assert_eq!(store.latest_results()[0].endpoint_name, "minio-4");
    }

    #[test]
    fn test_instances_are_isolated() {
        let a = HistoryStore::new();
        let b = HistoryStore::new();
        a.record_batch(batch(1));
        assert!(b.is_empty());

        // Clones share the same underlying state.
        let a2 = a.clone();
        a2.record_batch(batch(2));
        assert_eq!(a.len(), 2);
    }
}
