//! textdex - incremental full-text indexing and search for plain-text corpora.
//!
//! textdex keeps a [Tantivy](https://github.com/quickwit-oss/tantivy) index in
//! sync with a directory of `.txt` files. Each run scans the corpus, diffs it
//! against what the index already holds using file modification times, and
//! applies only the resulting additions, updates and removals, fanned out over
//! a small write pool and published in a single commit.
//!
//! # Quick start
//!
//! ```no_run
//! use std::{path::Path, sync::Arc};
//!
//! use textdex::{IndexOptions, SearchEngine, SearchOptions, indexer, search};
//!
//! let engine = Arc::new(SearchEngine::open(Path::new("/tmp/textdex")).unwrap());
//!
//! let report = indexer::run(
//!     &engine,
//!     Path::new("/corpus"),
//!     &IndexOptions::default(),
//! )
//! .unwrap();
//! println!("{} added, {} updated", report.added, report.updated);
//!
//! let hits = search::execute_search(
//!     &engine,
//!     &SearchOptions {
//!         query: "whale".to_string(),
//!         ..SearchOptions::default()
//!     },
//! )
//! .unwrap();
//! for hit in &hits {
//!     println!("{} by {} (score: {:.3})", hit.title, hit.author, hit.score);
//! }
//! ```

pub mod change;
pub mod coordinator;
pub mod data_dir;
pub mod document;
pub mod engine;
pub mod error;
pub mod indexer;
pub mod query;
pub mod scanner;
pub mod search;

pub use change::Mode;
pub use coordinator::WriteCoordinator;
pub use data_dir::DataDir;
pub use document::BlockMarkers;
pub use engine::{SearchEngine, SearchHit};
pub use error::{Error, Result};
pub use indexer::{ExecutionStrategy, IndexOptions, RunReport};
pub use search::SearchOptions;
