use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use parking_lot::{Condvar, Mutex};
use tantivy::IndexWriter;

use crate::{
    document::CorpusDocument,
    engine::SearchEngine,
    error::{Error, Result},
};

/// Default upper bound on waiting for in-flight writes at the end of a
/// run.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Default worker pool size: one thread per hardware thread, plus one.
pub fn default_worker_threads() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(4) + 1
}

/// Default submission queue capacity for a given pool size.
pub fn default_queue_capacity(worker_threads: usize) -> usize {
    worker_threads * 4
}

enum WriteOp {
    Add(CorpusDocument),
    Update(CorpusDocument),
}

/// Counters shared between submitters and workers. Every submitted op
/// ends up in exactly one of the outcome counters, and each increment
/// signals `done` so a drainer can re-check the totals.
#[derive(Default)]
struct TaskLedger {
    submitted: AtomicUsize,
    added: AtomicUsize,
    updated: AtomicUsize,
    failed: AtomicUsize,
    lock: Mutex<()>,
    done: Condvar,
}

impl TaskLedger {
    fn completed(&self) -> usize {
        self.added.load(Ordering::SeqCst)
            + self.updated.load(Ordering::SeqCst)
            + self.failed.load(Ordering::SeqCst)
    }
}

/// Outcome totals for one coordinator lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub added: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Fans document writes out over a small thread pool while keeping the
/// commit under the caller's control.
///
/// Adds and updates are queued onto a bounded channel; when the queue is
/// full the submitting thread executes the write itself instead of
/// blocking. Deletions are applied directly on the shared writer and are
/// expected only after a [`drain`](Self::drain). Nothing becomes visible
/// to readers until [`commit`](Self::commit), which runs exactly once.
/// Dropping a coordinator without committing seals the queue and joins
/// the pool; the run is discarded.
pub struct WriteCoordinator {
    engine: Arc<SearchEngine>,
    writer: Arc<IndexWriter>,
    sender: Option<Sender<WriteOp>>,
    workers: Vec<thread::JoinHandle<()>>,
    ledger: Arc<TaskLedger>,
    drain_timeout: Duration,
}

impl WriteCoordinator {
    pub fn new(
        engine: Arc<SearchEngine>,
        worker_threads: usize,
        queue_capacity: usize,
    ) -> Result<Self> {
        Self::with_drain_timeout(
            engine,
            worker_threads,
            queue_capacity,
            DRAIN_TIMEOUT,
        )
    }

    /// Build a pool with an explicit bound on how long
    /// [`drain`](Self::drain) may wait for outstanding writes.
    pub fn with_drain_timeout(
        engine: Arc<SearchEngine>,
        worker_threads: usize,
        queue_capacity: usize,
        drain_timeout: Duration,
    ) -> Result<Self> {
        let worker_threads = worker_threads.max(1);
        let queue_capacity = queue_capacity.max(1);

        let writer = Arc::new(engine.writer()?);
        let ledger = Arc::new(TaskLedger::default());
        let (sender, receiver) = bounded(queue_capacity);

        let mut workers = Vec::with_capacity(worker_threads);
        for i in 0..worker_threads {
            let engine = Arc::clone(&engine);
            let writer = Arc::clone(&writer);
            let ledger = Arc::clone(&ledger);
            let receiver: Receiver<WriteOp> = receiver.clone();

            let handle = thread::Builder::new()
                .name(format!("textdex-write-{i}"))
                .spawn(move || {
                    while let Ok(op) = receiver.recv() {
                        apply(&engine, &writer, &ledger, op);
                    }
                })?;
            workers.push(handle);
        }

        tracing::debug!(worker_threads, queue_capacity, "write pool started");

        Ok(Self {
            engine,
            writer,
            sender: Some(sender),
            workers,
            ledger,
            drain_timeout,
        })
    }

    pub fn submit_add(&self, document: CorpusDocument) {
        self.submit(WriteOp::Add(document));
    }

    pub fn submit_update(&self, document: CorpusDocument) {
        self.submit(WriteOp::Update(document));
    }

    fn submit(&self, op: WriteOp) {
        self.ledger.submitted.fetch_add(1, Ordering::SeqCst);

        let Some(sender) = &self.sender else {
            apply(&self.engine, &self.writer, &self.ledger, op);
            return;
        };

        match sender.try_send(op) {
            Ok(()) => {}
            // Queue full (or workers gone): run the write on this
            // thread rather than blocking or dropping it.
            Err(TrySendError::Full(op) | TrySendError::Disconnected(op)) => {
                apply(&self.engine, &self.writer, &self.ledger, op);
            }
        }
    }

    /// Queue a deletion on the shared writer. Callers must only do this
    /// once the pool is drained; deletions never run concurrently with
    /// document writes.
    pub fn delete(&self, identity: &str) {
        self.engine.delete_document(&self.writer, identity);
    }

    /// Close the queue and wait until every submitted write has been
    /// applied, then join the pool. Idempotent once drained: later
    /// calls return the final totals immediately. A drain that times
    /// out abandons the pool; the run can no longer be committed.
    pub fn drain(&mut self) -> Result<WriteStats> {
        // Closing the channel lets the workers exit once the queue is
        // empty.
        drop(self.sender.take());

        let deadline = Instant::now() + self.drain_timeout;
        let mut guard = self.ledger.lock.lock();
        while self.ledger.completed()
            < self.ledger.submitted.load(Ordering::SeqCst)
        {
            if self.ledger.done.wait_until(&mut guard, deadline).timed_out() {
                let pending = self.ledger.submitted.load(Ordering::SeqCst)
                    - self.ledger.completed();
                // A wedged worker would also hang the join in `drop`,
                // so the pool is detached and left to process
                // teardown.
                self.workers = Vec::new();
                return Err(Error::Concurrency(format!(
                    "write queue failed to drain within {}s \
                     ({pending} writes still outstanding)",
                    self.drain_timeout.as_secs()
                )));
            }
        }
        drop(guard);

        for worker in self.workers.drain(..) {
            worker.join().map_err(|_| {
                Error::Concurrency("index writer thread panicked".to_string())
            })?;
        }

        Ok(self.stats())
    }

    /// Drain outstanding writes and publish everything in one commit.
    pub fn commit(mut self) -> Result<WriteStats> {
        let stats = self.drain()?;

        // After a clean drain the pool is joined, so the writer has
        // exactly one owner left.
        let writer = Arc::get_mut(&mut self.writer).ok_or_else(|| {
            Error::Concurrency(
                "index writer still shared after drain".to_string(),
            )
        })?;
        writer.commit()?;

        tracing::debug!(
            added = stats.added,
            updated = stats.updated,
            failed = stats.failed,
            "write pool committed"
        );

        Ok(stats)
    }

    fn stats(&self) -> WriteStats {
        WriteStats {
            added: self.ledger.added.load(Ordering::SeqCst),
            updated: self.ledger.updated.load(Ordering::SeqCst),
            failed: self.ledger.failed.load(Ordering::SeqCst),
        }
    }
}

impl Drop for WriteCoordinator {
    fn drop(&mut self) {
        // Seal the queue and join the pool so no worker outlives the
        // coordinator. Without a commit the writer discards the run.
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl std::fmt::Debug for WriteCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteCoordinator")
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

fn apply(
    engine: &SearchEngine,
    writer: &IndexWriter,
    ledger: &TaskLedger,
    op: WriteOp,
) {
    let (document, is_update) = match &op {
        WriteOp::Add(document) => (document, false),
        WriteOp::Update(document) => (document, true),
    };

    let result = if is_update {
        engine.update_document(writer, document)
    } else {
        engine.add_document(writer, document)
    };

    match result {
        Ok(()) if is_update => {
            ledger.updated.fetch_add(1, Ordering::SeqCst);
        }
        Ok(()) => {
            ledger.added.fetch_add(1, Ordering::SeqCst);
        }
        Err(error) => {
            tracing::warn!(
                identity = %document.identity,
                %error,
                "indexing write failed"
            );
            ledger.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    // Signal under the lock so a drainer between its check and its wait
    // cannot miss the wakeup.
    let _completed = ledger.lock.lock();
    ledger.done.notify_all();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_doc(identity: &str, fingerprint: u64) -> CorpusDocument {
        CorpusDocument {
            identity: identity.to_string(),
            filename: identity.rsplit('/').next().unwrap().to_string(),
            author: "Unknown".to_string(),
            title: identity.to_string(),
            content: format!("body of {identity}"),
            stemmed_content: format!("body of {identity}"),
            filtered_content: format!("body {identity}"),
            fingerprint,
        }
    }

    #[test]
    fn concurrent_adds_all_land_in_one_commit() {
        let engine = Arc::new(SearchEngine::open_in_ram().unwrap());
        let coordinator =
            WriteCoordinator::new(Arc::clone(&engine), 4, 16).unwrap();

        for i in 0..20 {
            coordinator.submit_add(test_doc(&format!("/corpus/{i}.txt"), i));
        }

        let stats = coordinator.commit().unwrap();
        assert_eq!(stats.added, 20);
        assert_eq!(stats.updated, 0);
        assert_eq!(stats.failed, 0);
        assert_eq!(engine.num_docs().unwrap(), 20);
    }

    #[test]
    fn nothing_is_visible_before_commit() {
        let engine = Arc::new(SearchEngine::open_in_ram().unwrap());
        let mut coordinator =
            WriteCoordinator::new(Arc::clone(&engine), 2, 8).unwrap();

        for i in 0..5 {
            coordinator.submit_add(test_doc(&format!("/corpus/{i}.txt"), i));
        }

        let stats = coordinator.drain().unwrap();
        assert_eq!(stats.added, 5);
        // Drained but not committed: readers still see nothing.
        assert_eq!(engine.num_docs().unwrap(), 0);

        coordinator.commit().unwrap();
        assert_eq!(engine.num_docs().unwrap(), 5);
    }

    #[test]
    fn full_queue_falls_back_to_the_submitting_thread() {
        let engine = Arc::new(SearchEngine::open_in_ram().unwrap());
        // One slow-start worker and a single queue slot force most
        // submissions through the caller-runs path.
        let coordinator =
            WriteCoordinator::new(Arc::clone(&engine), 1, 1).unwrap();

        for i in 0..50 {
            coordinator.submit_add(test_doc(&format!("/corpus/{i}.txt"), i));
        }

        let stats = coordinator.commit().unwrap();
        assert_eq!(stats.added, 50);
        assert_eq!(engine.num_docs().unwrap(), 50);
    }

    #[test]
    fn updates_replace_previously_committed_documents() {
        let engine = Arc::new(SearchEngine::open_in_ram().unwrap());

        let first = WriteCoordinator::new(Arc::clone(&engine), 2, 8).unwrap();
        first.submit_add(test_doc("/corpus/a.txt", 100));
        first.commit().unwrap();

        let second = WriteCoordinator::new(Arc::clone(&engine), 2, 8).unwrap();
        second.submit_update(test_doc("/corpus/a.txt", 200));
        let stats = second.commit().unwrap();

        assert_eq!(stats.updated, 1);
        assert_eq!(engine.num_docs().unwrap(), 1);
        let snapshot = engine.snapshot().unwrap();
        assert_eq!(snapshot.get("/corpus/a.txt"), Some(&200));
    }

    #[test]
    fn deletes_apply_after_drain() {
        let engine = Arc::new(SearchEngine::open_in_ram().unwrap());

        let first = WriteCoordinator::new(Arc::clone(&engine), 2, 8).unwrap();
        first.submit_add(test_doc("/corpus/a.txt", 1));
        first.submit_add(test_doc("/corpus/b.txt", 2));
        first.commit().unwrap();

        let mut second =
            WriteCoordinator::new(Arc::clone(&engine), 2, 8).unwrap();
        second.drain().unwrap();
        second.delete("/corpus/a.txt");
        second.commit().unwrap();

        assert_eq!(engine.num_docs().unwrap(), 1);
        assert!(engine.snapshot().unwrap().contains_key("/corpus/b.txt"));
    }

    #[test]
    fn empty_run_commits_cleanly() {
        let engine = Arc::new(SearchEngine::open_in_ram().unwrap());
        let coordinator =
            WriteCoordinator::new(Arc::clone(&engine), 3, 12).unwrap();

        let stats = coordinator.commit().unwrap();
        assert_eq!(stats, WriteStats::default());
        assert_eq!(engine.num_docs().unwrap(), 0);
    }

    #[test]
    fn drain_times_out_when_writes_cannot_finish() {
        let engine = Arc::new(SearchEngine::open_in_ram().unwrap());
        let mut coordinator = WriteCoordinator::with_drain_timeout(
            Arc::clone(&engine),
            1,
            600,
            Duration::ZERO,
        )
        .unwrap();

        // One worker behind a deep queue of non-trivial bodies: the
        // writes cannot all have landed by the time the already-expired
        // bound is checked.
        for i in 0..500 {
            let mut document = test_doc(&format!("/corpus/{i}.txt"), i);
            document.content = "lorem ipsum dolor sit amet ".repeat(80);
            coordinator.submit_add(document);
        }

        let err = coordinator.drain().unwrap_err();
        assert!(matches!(err, Error::Concurrency(_)));
        // The run never reached a commit, so none of it is visible.
        assert_eq!(engine.num_docs().unwrap(), 0);
    }

    #[test]
    fn dropping_without_commit_discards_and_releases_the_writer() {
        let engine = Arc::new(SearchEngine::open_in_ram().unwrap());

        let coordinator =
            WriteCoordinator::new(Arc::clone(&engine), 2, 8).unwrap();
        for i in 0..10 {
            coordinator.submit_add(test_doc(&format!("/corpus/{i}.txt"), i));
        }
        drop(coordinator);

        // The pool is joined on drop: nothing leaked into the index and
        // the writer lock is free for the next run.
        assert_eq!(engine.num_docs().unwrap(), 0);
        let next = WriteCoordinator::new(Arc::clone(&engine), 2, 8).unwrap();
        next.submit_add(test_doc("/corpus/next.txt", 99));
        let stats = next.commit().unwrap();
        assert_eq!(stats.added, 1);
        assert_eq!(engine.num_docs().unwrap(), 1);
    }

    #[test]
    fn pool_defaults_scale_with_parallelism() {
        let workers = default_worker_threads();
        assert!(workers >= 2);
        assert_eq!(default_queue_capacity(workers), workers * 4);
    }
}
