use std::{path::Path, sync::Arc, time::Instant};

use crate::{
    change::{Mode, Mutation, plan_changes},
    coordinator::{self, WriteCoordinator},
    document::{BlockMarkers, build_document},
    engine::SearchEngine,
    error::Result,
    scanner::scan_corpus,
};

/// How one indexing run mutated the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    /// Writes that failed inside the pool. Always zero for sequential
    /// runs, which abort on the first failure instead.
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    Sequential,
    Concurrent,
}

/// Knobs for one indexing run.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub mode: Mode,
    /// When set, only text between these markers is indexed.
    pub markers: Option<BlockMarkers>,
    pub strategy: ExecutionStrategy,
    /// Pool size override; `None` derives it from hardware parallelism.
    pub worker_threads: Option<usize>,
    /// Queue capacity override; `None` derives it from the pool size.
    pub queue_capacity: Option<usize>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            mode: Mode::All,
            markers: None,
            strategy: ExecutionStrategy::Concurrent,
            worker_threads: None,
            queue_capacity: None,
        }
    }
}

/// Run one scan/diff/write cycle against the engine.
///
/// Scans the corpus directory, diffs it against the committed snapshot
/// under the run's mode, applies the planned mutations and commits once
/// at the end. Errors before the commit leave the index untouched.
pub fn run(
    engine: &Arc<SearchEngine>,
    corpus_dir: &Path,
    options: &IndexOptions,
) -> Result<RunReport> {
    let started = Instant::now();

    let scan = scan_corpus(corpus_dir)?;
    let snapshot = engine.snapshot()?;
    let plan = plan_changes(&snapshot, &scan, options.mode);

    tracing::info!(
        mode = %options.mode,
        scanned = scan.len(),
        indexed = snapshot.len(),
        planned = plan.len(),
        "indexing run planned"
    );

    let report = match options.strategy {
        ExecutionStrategy::Sequential => {
            execute_sequential(engine, &plan, options)?
        }
        ExecutionStrategy::Concurrent => {
            execute_concurrent(engine, &plan, options)?
        }
    };

    tracing::info!(
        added = report.added,
        updated = report.updated,
        removed = report.removed,
        failed = report.failed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "indexing run finished"
    );

    Ok(report)
}

/// Apply the plan on the calling thread, in plan order.
fn execute_sequential(
    engine: &SearchEngine,
    plan: &[Mutation],
    options: &IndexOptions,
) -> Result<RunReport> {
    let mut writer = engine.writer()?;
    let mut report = RunReport::default();

    for mutation in plan {
        match mutation {
            Mutation::Add(file) => {
                let document = build_document(file, options.markers.as_ref())?;
                engine.add_document(&writer, &document)?;
                report.added += 1;
            }
            Mutation::Update(file) => {
                let document = build_document(file, options.markers.as_ref())?;
                engine.update_document(&writer, &document)?;
                report.updated += 1;
            }
            Mutation::Delete(identity) => {
                engine.delete_document(&writer, identity);
                report.removed += 1;
            }
        }
    }

    writer.commit()?;
    Ok(report)
}

/// Apply the plan through the write pool. Documents are still built on
/// this thread; only the engine writes fan out. Deletions wait for the
/// drain barrier so they never race a concurrent add or update.
fn execute_concurrent(
    engine: &Arc<SearchEngine>,
    plan: &[Mutation],
    options: &IndexOptions,
) -> Result<RunReport> {
    let worker_threads = options
        .worker_threads
        .unwrap_or_else(coordinator::default_worker_threads);
    let queue_capacity = options
        .queue_capacity
        .unwrap_or_else(|| coordinator::default_queue_capacity(worker_threads));

    let mut coordinator = WriteCoordinator::new(
        Arc::clone(engine),
        worker_threads,
        queue_capacity,
    )?;

    let mut deletions: Vec<&str> = Vec::new();
    for mutation in plan {
        match mutation {
            Mutation::Add(file) => {
                let document = build_document(file, options.markers.as_ref())?;
                coordinator.submit_add(document);
            }
            Mutation::Update(file) => {
                let document = build_document(file, options.markers.as_ref())?;
                coordinator.submit_update(document);
            }
            Mutation::Delete(identity) => deletions.push(identity),
        }
    }

    coordinator.drain()?;
    for identity in &deletions {
        coordinator.delete(identity);
    }
    let stats = coordinator.commit()?;

    Ok(RunReport {
        added: stats.added,
        updated: stats.updated,
        removed: deletions.len(),
        failed: stats.failed,
    })
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        path::{Path, PathBuf},
        time::{Duration, SystemTime},
    };

    use super::*;

    fn write_corpus_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn bump_mtime(path: &Path, seconds: u64) {
        let file = fs::OpenOptions::new().write(true).open(path).unwrap();
        let newer = SystemTime::now() + Duration::from_secs(seconds);
        file.set_modified(newer).unwrap();
    }

    fn identity_of(path: &Path) -> String {
        path.canonicalize().unwrap().to_string_lossy().to_string()
    }

    fn options(mode: Mode, strategy: ExecutionStrategy) -> IndexOptions {
        IndexOptions {
            mode,
            strategy,
            ..IndexOptions::default()
        }
    }

    #[test]
    fn all_mode_indexes_a_fresh_corpus_once() {
        let corpus = tempfile::tempdir().unwrap();
        write_corpus_file(corpus.path(), "a.txt", "alpha text");
        write_corpus_file(corpus.path(), "b.txt", "beta text");
        write_corpus_file(corpus.path(), "c.txt", "gamma text");

        let engine = Arc::new(SearchEngine::open_in_ram().unwrap());
        let opts = options(Mode::All, ExecutionStrategy::Concurrent);

        let first = run(&engine, corpus.path(), &opts).unwrap();
        assert_eq!(first, RunReport { added: 3, ..RunReport::default() });
        assert_eq!(engine.num_docs().unwrap(), 3);

        // Unchanged corpus: the second run is a no-op.
        let second = run(&engine, corpus.path(), &opts).unwrap();
        assert_eq!(second, RunReport::default());
        assert_eq!(engine.num_docs().unwrap(), 3);
    }

    #[test]
    fn all_mode_reindexes_modified_files() {
        let corpus = tempfile::tempdir().unwrap();
        let a = write_corpus_file(corpus.path(), "a.txt", "alpha text");
        write_corpus_file(corpus.path(), "b.txt", "beta text");

        let engine = Arc::new(SearchEngine::open_in_ram().unwrap());
        let opts = options(Mode::All, ExecutionStrategy::Concurrent);
        run(&engine, corpus.path(), &opts).unwrap();

        bump_mtime(&a, 10);
        let report = run(&engine, corpus.path(), &opts).unwrap();
        assert_eq!(report, RunReport { updated: 1, ..RunReport::default() });
        assert_eq!(engine.num_docs().unwrap(), 2);
    }

    #[test]
    fn new_mode_only_adds_unseen_files() {
        let corpus = tempfile::tempdir().unwrap();
        let a = write_corpus_file(corpus.path(), "a.txt", "alpha text");
        let b = write_corpus_file(corpus.path(), "b.txt", "beta text");

        let engine = Arc::new(SearchEngine::open_in_ram().unwrap());
        run(&engine, corpus.path(), &options(Mode::All, ExecutionStrategy::Concurrent))
            .unwrap();

        bump_mtime(&a, 10);
        fs::remove_file(&b).unwrap();
        write_corpus_file(corpus.path(), "c.txt", "gamma text");

        let report = run(
            &engine,
            corpus.path(),
            &options(Mode::New, ExecutionStrategy::Concurrent),
        )
        .unwrap();
        assert_eq!(report, RunReport { added: 1, ..RunReport::default() });
        // The stale file keeps its old entry and the orphan survives.
        assert_eq!(engine.num_docs().unwrap(), 3);
        assert!(engine.snapshot().unwrap().contains_key(&identity_of(&a)));
    }

    #[test]
    fn changed_mode_only_updates_stale_files() {
        let corpus = tempfile::tempdir().unwrap();
        let a = write_corpus_file(corpus.path(), "a.txt", "alpha text");
        let b = write_corpus_file(corpus.path(), "b.txt", "beta text");

        let engine = Arc::new(SearchEngine::open_in_ram().unwrap());
        run(&engine, corpus.path(), &options(Mode::All, ExecutionStrategy::Concurrent))
            .unwrap();

        bump_mtime(&a, 10);
        fs::remove_file(&b).unwrap();
        write_corpus_file(corpus.path(), "c.txt", "gamma text");

        let report = run(
            &engine,
            corpus.path(),
            &options(Mode::Changed, ExecutionStrategy::Concurrent),
        )
        .unwrap();
        assert_eq!(report, RunReport { updated: 1, ..RunReport::default() });
        assert_eq!(engine.num_docs().unwrap(), 2);
    }

    #[test]
    fn missing_mode_removes_orphans_and_nothing_else() {
        let corpus = tempfile::tempdir().unwrap();
        let a = write_corpus_file(corpus.path(), "a.txt", "alpha text");
        let b = write_corpus_file(corpus.path(), "b.txt", "beta text");

        let engine = Arc::new(SearchEngine::open_in_ram().unwrap());
        run(&engine, corpus.path(), &options(Mode::All, ExecutionStrategy::Concurrent))
            .unwrap();

        bump_mtime(&a, 10);
        fs::remove_file(&b).unwrap();
        write_corpus_file(corpus.path(), "c.txt", "gamma text");

        let report = run(
            &engine,
            corpus.path(),
            &options(Mode::Missing, ExecutionStrategy::Concurrent),
        )
        .unwrap();
        assert_eq!(report, RunReport { removed: 1, ..RunReport::default() });

        let snapshot = engine.snapshot().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key(&identity_of(&a)));
    }

    #[test]
    fn sequential_and_concurrent_runs_agree() {
        let corpus = tempfile::tempdir().unwrap();
        for i in 0..8 {
            write_corpus_file(
                corpus.path(),
                &format!("doc{i}.txt"),
                &format!("document number {i}"),
            );
        }

        let sequential = Arc::new(SearchEngine::open_in_ram().unwrap());
        let concurrent = Arc::new(SearchEngine::open_in_ram().unwrap());

        let left = run(
            &sequential,
            corpus.path(),
            &options(Mode::All, ExecutionStrategy::Sequential),
        )
        .unwrap();
        let right = run(
            &concurrent,
            corpus.path(),
            &options(Mode::All, ExecutionStrategy::Concurrent),
        )
        .unwrap();

        assert_eq!(left, right);
        assert_eq!(
            sequential.snapshot().unwrap(),
            concurrent.snapshot().unwrap()
        );
    }

    #[test]
    fn sequential_missing_mode_matches_concurrent() {
        let corpus = tempfile::tempdir().unwrap();
        write_corpus_file(corpus.path(), "keep.txt", "kept");
        let gone = write_corpus_file(corpus.path(), "gone.txt", "dropped");

        let engine = Arc::new(SearchEngine::open_in_ram().unwrap());
        run(&engine, corpus.path(), &options(Mode::All, ExecutionStrategy::Sequential))
            .unwrap();

        fs::remove_file(&gone).unwrap();
        let report = run(
            &engine,
            corpus.path(),
            &options(Mode::Missing, ExecutionStrategy::Sequential),
        )
        .unwrap();

        assert_eq!(report, RunReport { removed: 1, ..RunReport::default() });
        assert_eq!(engine.num_docs().unwrap(), 1);
    }

    #[test]
    fn missing_corpus_directory_fails_before_any_write() {
        let engine = Arc::new(SearchEngine::open_in_ram().unwrap());
        let err = run(
            &engine,
            Path::new("/nonexistent/corpus/path"),
            &options(Mode::All, ExecutionStrategy::Concurrent),
        )
        .unwrap_err();
        assert!(!err.is_recoverable());
        assert_eq!(engine.num_docs().unwrap(), 0);
    }
}
