use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "textdex",
    about = "Incremental full-text indexing and search for plain-text corpora"
)]
pub struct Cli {
    /// Override the data directory (defaults to the XDG data home)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan a corpus directory and bring the index up to date
    Index(IndexArgs),
    /// Search the index
    Search(SearchArgs),
    /// Show index location and statistics
    Status(StatusArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Index --

#[derive(Debug, Parser)]
pub struct IndexArgs {
    /// Directory containing the .txt corpus
    pub corpus: PathBuf,

    /// Which changes to apply: all, new, changed, or missing
    #[arg(short, long, default_value = "all")]
    pub mode: String,

    /// Index only the text between Project Gutenberg start/end markers
    #[arg(long)]
    pub block_capture: bool,

    /// Apply writes on the calling thread instead of the worker pool
    #[arg(long)]
    pub sequential: bool,

    /// Write pool size (default: hardware parallelism plus one)
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,

    /// Write queue capacity (default: four slots per worker)
    #[arg(long, value_name = "N")]
    pub queue_size: Option<usize>,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query (omit it to start an interactive session)
    pub query: Option<String>,

    /// Number of results to return
    #[arg(short = 'n', long, default_value = "10")]
    pub count: usize,

    /// Search only within this field (e.g. author, title, content)
    #[arg(short = 'f', long)]
    pub field: Option<String>,

    /// Match the query as one exact phrase
    #[arg(short, long)]
    pub phrase: bool,

    /// Include the scoring explanation for each hit
    #[arg(long)]
    pub explain: bool,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "textdex",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parse_search_defaults() {
        let cli = Cli::parse_from(["textdex", "search", "hello"]);
        match cli.command {
            Command::Search(args) => {
                assert_eq!(args.query.as_deref(), Some("hello"));
                assert_eq!(args.count, 10);
                assert!(args.field.is_none());
                assert!(!args.phrase);
                assert!(!args.explain);
                assert!(!args.json);
            }
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn parse_search_without_query() {
        let cli = Cli::parse_from(["textdex", "search"]);
        match cli.command {
            Command::Search(args) => assert!(args.query.is_none()),
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn parse_index_flags() {
        let cli = Cli::parse_from([
            "textdex", "index", "/corpus", "--mode", "changed", "--sequential",
            "--threads", "3",
        ]);
        match cli.command {
            Command::Index(args) => {
                assert_eq!(args.corpus, PathBuf::from("/corpus"));
                assert_eq!(args.mode, "changed");
                assert!(args.sequential);
                assert_eq!(args.threads, Some(3));
                assert_eq!(args.queue_size, None);
                assert!(!args.block_capture);
            }
            _ => panic!("expected index command"),
        }
    }
}
