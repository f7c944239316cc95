//! Deferred write queue drained on reconnection.
//!
//! Records replay strictly in insertion order. A failed replay stops the
//! pass so nothing is ever delivered ahead of an older record; the stuck
//! record is retried from the front on the next reconnection signal. There
//! is no backoff and no retry cap, so a record the origin can never accept
//! blocks every record behind it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::RequestKey;
use crate::error::Result;
use crate::fetch::Transport;
use crate::sync::{Journal, QueuedWrite};

// == Drain Results ==
/// Summary of one completed drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Records acknowledged and removed
    pub replayed: usize,
    /// Records outside the write-endpoint prefix, left untouched
    pub skipped: usize,
    /// Records still queued after the pass
    pub remaining: usize,
    /// Record whose replay failed and stopped the pass
    pub blocked_on: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    Completed(DrainReport),
    /// Another pass was in flight; nothing was attempted
    AlreadyDraining,
}

/// Clears the in-flight flag when the drain finishes or its future is dropped.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// == Sync Queue ==
#[derive(Debug)]
pub struct SyncQueue {
    records: Mutex<VecDeque<QueuedWrite>>,
    journal: Option<Journal>,
    endpoint_prefix: String,
    next_id: AtomicU64,
    draining: AtomicBool,
}

impl SyncQueue {
    /// Memory-only queue.
    pub fn new(endpoint_prefix: impl Into<String>) -> Self {
        Self::from_parts(endpoint_prefix.into(), VecDeque::new(), None)
    }

    /// Queue backed by a journal file, reloading whatever it already holds.
    pub async fn with_journal(endpoint_prefix: impl Into<String>, journal: Journal) -> Result<Self> {
        let records: VecDeque<QueuedWrite> = journal.load().await?.into();
        if !records.is_empty() {
            info!(
                "Restored {} queued write(s) from {}",
                records.len(),
                journal.path().display()
            );
        }
        Ok(Self::from_parts(endpoint_prefix.into(), records, Some(journal)))
    }

    fn from_parts(
        endpoint_prefix: String,
        records: VecDeque<QueuedWrite>,
        journal: Option<Journal>,
    ) -> Self {
        let next_id = records.iter().map(|r| r.id).max().map_or(1, |id| id + 1);
        Self {
            records: Mutex::new(records),
            journal,
            endpoint_prefix,
            next_id: AtomicU64::new(next_id),
            draining: AtomicBool::new(false),
        }
    }

    /// Whether `key` targets a write endpoint eligible for replay.
    pub fn accepts(&self, key: &RequestKey) -> bool {
        url_path(&key.url).starts_with(&self.endpoint_prefix)
    }

    // == Enqueue ==
    /// Appends a write-intent record.
    ///
    /// Fails only when the journal cannot be written; the in-memory queue is
    /// rolled back so memory and disk stay identical.
    pub async fn enqueue(
        &self,
        key: RequestKey,
        headers: Vec<(String, String)>,
        payload: Vec<u8>,
    ) -> Result<QueuedWrite> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = QueuedWrite::new(id, key, headers, payload);

        let mut records = self.records.lock().await;
        records.push_back(record.clone());
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.persist(records.iter()).await {
                records.pop_back();
                return Err(e);
            }
        }

        debug!("Queued write #{} {} ({} pending)", id, record.key, records.len());
        Ok(record)
    }

    // == Drain ==
    /// Replays eligible records in FIFO order against `transport`.
    ///
    /// At most one pass runs at a time; a concurrent call returns
    /// [`DrainOutcome::AlreadyDraining`] immediately.
    pub async fn drain<T: Transport>(&self, transport: &T) -> Result<DrainOutcome> {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Drain already in flight, ignoring signal");
            return Ok(DrainOutcome::AlreadyDraining);
        }
        let _guard = DrainGuard(&self.draining);

        let (pending, skipped) = {
            let records = self.records.lock().await;
            let pending: Vec<QueuedWrite> = records
                .iter()
                .filter(|r| self.accepts(&r.key))
                .cloned()
                .collect();
            let skipped = records.len() - pending.len();
            (pending, skipped)
        };

        let mut report = DrainReport {
            skipped,
            ..DrainReport::default()
        };

        for record in pending {
            match transport.fetch(record.to_request()).await {
                Ok(response) => {
                    debug!("Replayed write #{} {} -> {}", record.id, record.key, response.status);
                    self.remove(record.id).await;
                    report.replayed += 1;
                }
                Err(e) => {
                    warn!(
                        "Replay of write #{} {} failed (attempt {}): {}",
                        record.id,
                        record.key,
                        record.attempts + 1,
                        e
                    );
                    self.record_failure(record.id).await;
                    report.blocked_on = Some(record.id);
                    break;
                }
            }
        }

        report.remaining = self.len().await;
        if report.replayed > 0 || report.blocked_on.is_some() {
            info!(
                "Sync drain: replayed {}, remaining {}",
                report.replayed, report.remaining
            );
        }
        Ok(DrainOutcome::Completed(report))
    }

    /// Drops a delivered record. The delivery already happened, so a journal
    /// failure is logged and the pass continues; the next successful persist
    /// brings the file back in line with memory.
    async fn remove(&self, id: u64) {
        let mut records = self.records.lock().await;
        if let Some(pos) = records.iter().position(|r| r.id == id) {
            records.remove(pos);
        }
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.persist(records.iter()).await {
                warn!("Could not persist removal of #{}: {}", id, e);
            }
        }
    }

    async fn record_failure(&self, id: u64) {
        let mut records = self.records.lock().await;
        if let Some(record) = records.iter_mut().find(|r| r.id == id) {
            record.attempts += 1;
        }
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.persist(records.iter()).await {
                warn!("Could not persist replay attempt for #{}: {}", id, e);
            }
        }
    }

    // == Accessors ==
    /// Copy of the queue in FIFO order.
    pub async fn snapshot(&self) -> Vec<QueuedWrite> {
        self.records.lock().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Drops every record. Returns how many were dropped.
    pub async fn clear(&self) -> Result<usize> {
        let mut records = self.records.lock().await;
        let count = records.len();
        records.clear();
        if let Some(journal) = &self.journal {
            journal.persist(records.iter()).await?;
        }
        Ok(count)
    }
}

/// Path component of an origin-relative or absolute URL.
fn url_path(url: &str) -> &str {
    match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            rest.find('/').map_or("/", |slash| &rest[slash..])
        }
        None => url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex as StdMutex};

    use tokio::sync::Notify;

    use crate::error::WorkerError;
    use crate::fetch::{FetchRequest, FetchResponse, ResponseType};

    const PREFIX: &str = "/api/analytics/track";

    /// Records every replayed body; fails for bodies in `failing`.
    #[derive(Default)]
    struct ScriptedTransport {
        failing: StdMutex<HashSet<Vec<u8>>>,
        seen: StdMutex<Vec<Vec<u8>>>,
    }

    impl ScriptedTransport {
        fn fail(&self, body: &str) {
            self.failing.lock().unwrap().insert(body.as_bytes().to_vec());
        }

        fn heal(&self) {
            self.failing.lock().unwrap().clear();
        }

        fn seen(&self) -> Vec<String> {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .map(|b| String::from_utf8_lossy(b).into_owned())
                .collect()
        }
    }

    impl Transport for ScriptedTransport {
        async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
            self.seen.lock().unwrap().push(request.body.clone());
            if self.failing.lock().unwrap().contains(&request.body) {
                return Err(WorkerError::Network("offline".to_string()));
            }
            Ok(FetchResponse::new(204, ResponseType::Basic, request.url, Vec::new(), Vec::new()))
        }
    }

    async fn track(queue: &SyncQueue, body: &str) -> QueuedWrite {
        queue
            .enqueue(RequestKey::new("POST", PREFIX), Vec::new(), body.as_bytes().to_vec())
            .await
            .unwrap()
    }

    fn report(outcome: DrainOutcome) -> DrainReport {
        match outcome {
            DrainOutcome::Completed(report) => report,
            DrainOutcome::AlreadyDraining => panic!("unexpected overlapping drain"),
        }
    }

    #[test]
    fn test_accepts_prefix_on_relative_and_absolute_urls() {
        let queue = SyncQueue::new(PREFIX);
        assert!(queue.accepts(&RequestKey::new("POST", "/api/analytics/track?src=web")));
        assert!(queue.accepts(&RequestKey::new("POST", "https://notalabel.app/api/analytics/track")));
        assert!(!queue.accepts(&RequestKey::new("POST", "/api/feedback")));
    }

    #[tokio::test]
    async fn test_enqueue_assigns_increasing_ids() {
        let queue = SyncQueue::new(PREFIX);
        let a = track(&queue, "a").await;
        let b = track(&queue, "b").await;

        assert!(b.id > a.id);
        assert_eq!(queue.len().await, 2);
    }

    #[tokio::test]
    async fn test_drain_replays_in_fifo_order() {
        let queue = SyncQueue::new(PREFIX);
        let transport = ScriptedTransport::default();
        track(&queue, "a").await;
        track(&queue, "b").await;
        track(&queue, "c").await;

        let report = report(queue.drain(&transport).await.unwrap());

        assert_eq!(report.replayed, 3);
        assert_eq!(report.remaining, 0);
        assert_eq!(transport.seen(), vec!["a", "b", "c"]);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_failed_replay_stops_the_pass() {
        let queue = SyncQueue::new(PREFIX);
        let transport = ScriptedTransport::default();
        let a = track(&queue, "a").await;
        track(&queue, "b").await;
        transport.fail("a");

        let first = report(queue.drain(&transport).await.unwrap());
        assert_eq!(first.replayed, 0);
        assert_eq!(first.blocked_on, Some(a.id));
        assert_eq!(transport.seen(), vec!["a"]);

        let queued = queue.snapshot().await;
        assert_eq!(queued[0].attempts, 1);
        assert_eq!(queued.len(), 2);

        transport.heal();
        let second = report(queue.drain(&transport).await.unwrap());
        assert_eq!(second.replayed, 2);
        assert_eq!(transport.seen(), vec!["a", "a", "b"]);
    }

    #[tokio::test]
    async fn test_drain_leaves_foreign_records_untouched() {
        let queue = SyncQueue::new(PREFIX);
        let transport = ScriptedTransport::default();
        queue
            .enqueue(RequestKey::new("POST", "/api/feedback"), Vec::new(), b"x".to_vec())
            .await
            .unwrap();
        track(&queue, "a").await;

        let report = report(queue.drain(&transport).await.unwrap());

        assert_eq!(report.replayed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.remaining, 1);
        assert_eq!(transport.seen(), vec!["a"]);
    }

    /// Blocks every replay until released.
    #[derive(Default)]
    struct GatedTransport {
        entered: Notify,
        release: Notify,
    }

    impl Transport for GatedTransport {
        async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(FetchResponse::new(204, ResponseType::Basic, request.url, Vec::new(), Vec::new()))
        }
    }

    #[tokio::test]
    async fn test_drain_refused_while_replay_in_flight() {
        let queue = Arc::new(SyncQueue::new(PREFIX));
        let transport = Arc::new(GatedTransport::default());
        track(&queue, "a").await;

        let first = {
            let queue = queue.clone();
            let transport = transport.clone();
            tokio::spawn(async move { queue.drain(transport.as_ref()).await })
        };
        transport.entered.notified().await;
        assert!(queue.is_draining());

        let second = queue.drain(&ScriptedTransport::default()).await.unwrap();
        assert_eq!(second, DrainOutcome::AlreadyDraining);

        transport.release.notify_one();
        let report = report(first.await.unwrap().unwrap());
        assert_eq!(report.replayed, 1);
        assert!(!queue.is_draining());
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_drain_continues_when_journal_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path().join("gone").join("sync.json"));
        let records: VecDeque<QueuedWrite> = [1, 2]
            .into_iter()
            .map(|id| QueuedWrite::new(id, RequestKey::new("POST", PREFIX), Vec::new(), vec![b'0' + id as u8]))
            .collect();
        let queue = SyncQueue::from_parts(PREFIX.to_string(), records, Some(journal));
        let transport = ScriptedTransport::default();

        let report = report(queue.drain(&transport).await.unwrap());

        assert_eq!(report.replayed, 2);
        assert_eq!(report.remaining, 0);
        assert_eq!(transport.seen(), vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_overlapping_drain_is_refused() {
        let queue = SyncQueue::new(PREFIX);
        let transport = ScriptedTransport::default();
        queue.draining.store(true, Ordering::Release);

        let outcome = queue.drain(&transport).await.unwrap();
        assert_eq!(outcome, DrainOutcome::AlreadyDraining);

        queue.draining.store(false, Ordering::Release);
        assert!(matches!(
            queue.drain(&transport).await.unwrap(),
            DrainOutcome::Completed(_)
        ));
        assert!(!queue.is_draining());
    }

    #[tokio::test]
    async fn test_journal_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.json");

        {
            let queue = SyncQueue::with_journal(PREFIX, Journal::new(&path)).await.unwrap();
            track(&queue, "a").await;
            track(&queue, "b").await;
        }

        let queue = SyncQueue::with_journal(PREFIX, Journal::new(&path)).await.unwrap();
        let restored = queue.snapshot().await;
        assert_eq!(restored.len(), 2);
        assert_eq!(restored[0].payload, b"a");

        let c = track(&queue, "c").await;
        assert!(c.id > restored[1].id);
    }

    #[tokio::test]
    async fn test_enqueue_rolls_back_when_journal_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path().join("gone").join("sync.json"));
        let queue = SyncQueue::from_parts(PREFIX.to_string(), VecDeque::new(), Some(journal));

        let result = queue
            .enqueue(RequestKey::new("POST", PREFIX), Vec::new(), b"a".to_vec())
            .await;

        assert!(matches!(result, Err(WorkerError::Storage(_))));
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_clear() {
        let queue = SyncQueue::new(PREFIX);
        track(&queue, "a").await;
        assert_eq!(queue.clear().await.unwrap(), 1);
        assert!(queue.is_empty().await);
    }
}
