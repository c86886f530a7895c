use std::{sync::Arc, time::Instant};

use clap::Parser;
use tracing_subscriber::EnvFilter;

pub mod change;
pub mod cli;
pub mod coordinator;
pub mod data_dir;
pub mod document;
pub mod engine;
pub mod error;
pub mod indexer;
pub mod query;
pub mod scanner;
pub mod search;

use change::Mode;
use cli::{Cli, Command};
use data_dir::DataDir;
use document::BlockMarkers;
use engine::SearchEngine;
use indexer::{ExecutionStrategy, IndexOptions};
use search::SearchOptions;

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("TEXTDEX_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;

    match cli.command {
        Command::Index(args) => cmd_index(&data_dir, &args)?,
        Command::Search(args) => cmd_search(&data_dir, &args)?,
        Command::Status(args) => cmd_status(&data_dir, args.json)?,
        Command::Completions(args) => args.generate(),
    }

    Ok(())
}

fn cmd_index(data_dir: &DataDir, args: &cli::IndexArgs) -> error::Result<()> {
    let mode: Mode = args.mode.parse()?;
    let engine = Arc::new(SearchEngine::open(&data_dir.index_dir()?)?);

    let options = IndexOptions {
        mode,
        markers: args.block_capture.then(BlockMarkers::gutenberg),
        strategy: if args.sequential {
            ExecutionStrategy::Sequential
        } else {
            ExecutionStrategy::Concurrent
        },
        worker_threads: args.threads,
        queue_capacity: args.queue_size,
    };

    let started = Instant::now();
    let report = indexer::run(&engine, &args.corpus, &options)?;

    println!(
        "Indexed {} in {:.2?}: {} added, {} updated, {} removed, {} failed",
        args.corpus.display(),
        started.elapsed(),
        report.added,
        report.updated,
        report.removed,
        report.failed
    );
    Ok(())
}

fn cmd_search(data_dir: &DataDir, args: &cli::SearchArgs) -> error::Result<()> {
    let engine = SearchEngine::open(&data_dir.index_dir()?)?;

    let options = SearchOptions {
        query: args.query.clone().unwrap_or_default(),
        limit: args.count,
        field: args.field.clone(),
        phrase: args.phrase,
        explain: args.explain,
    };

    // No query on the command line drops into the interactive session.
    if args.query.is_none() {
        let stdin = std::io::stdin();
        return search::run_session(
            &engine,
            &options,
            stdin.lock(),
            &mut std::io::stdout(),
        );
    }

    let hits = search::execute_search(&engine, &options)?;

    if args.json {
        println!("{}", search::format_json(&hits)?);
    } else {
        print!("{}", search::format_human(&hits));
    }
    Ok(())
}

fn cmd_status(data_dir: &DataDir, json: bool) -> error::Result<()> {
    let index_dir = data_dir.index_dir()?;
    let engine = SearchEngine::open(&index_dir)?;
    let documents = engine.num_docs()?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "data_dir": data_dir.root().display().to_string(),
                "index_dir": index_dir.display().to_string(),
                "documents": documents,
            })
        );
    } else {
        println!("Data directory: {}", data_dir.root().display());
        println!("Index directory: {}", index_dir.display());
        println!("Documents: {documents}");
    }
    Ok(())
}
