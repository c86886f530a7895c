use std::{
    fmt::Write as _,
    io::{BufRead, Write},
};

use crate::{
    engine::{SearchEngine, SearchHit},
    error::Result,
    query::build_query,
};

/// Default number of hits returned when the caller does not say.
pub const DEFAULT_LIMIT: usize = 10;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub query: String,
    pub limit: usize,
    /// Restrict matching to one schema field instead of all of them.
    pub field: Option<String>,
    /// Treat the whole query as one exact phrase.
    pub phrase: bool,
    pub explain: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            query: String::new(),
            limit: DEFAULT_LIMIT,
            field: None,
            phrase: false,
            explain: false,
        }
    }
}

/// Execute the full search pipeline.
///
/// 1. Rewrite the raw query (wildcards, operators, phrase mode)
/// 2. Parse it against the schema, restricted to --field if given
/// 3. Run it, keeping the top -n hits
///
/// A blank query matches nothing.
pub fn execute_search(
    engine: &SearchEngine,
    options: &SearchOptions,
) -> Result<Vec<SearchHit>> {
    let Some(query) = build_query(
        engine,
        &options.query,
        options.phrase,
        options.field.as_deref(),
    )?
    else {
        return Ok(Vec::new());
    };

    engine.search(&*query, options.limit, options.explain)
}

/// Format results for human-readable terminal output.
pub fn format_human(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No results found.\n".to_string();
    }

    let mut out = String::new();
    for (rank, hit) in hits.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>3}. [{:.3}] {} by {}",
            rank + 1,
            hit.score,
            hit.title,
            hit.author
        );
        let _ = writeln!(out, "     {}", hit.identity);
        if let Some(explanation) = &hit.explanation {
            for line in explanation.lines() {
                let _ = writeln!(out, "     {line}");
            }
        }
    }
    let _ = writeln!(out, "\n{} result(s)", hits.len());

    out
}

/// Format results as JSON output.
pub fn format_json(hits: &[SearchHit]) -> Result<String> {
    Ok(serde_json::to_string_pretty(hits)?)
}

/// Run an interactive query session, one query per line.
///
/// Each line read from `input` is executed with the session's options
/// and printed to `output` in the human format. A blank line or end of
/// input ends the session. A query the engine rejects is reported and
/// the session keeps going; engine and I/O faults abort it.
pub fn run_session<R: BufRead, W: Write>(
    engine: &SearchEngine,
    options: &SearchOptions,
    mut input: R,
    output: &mut W,
) -> Result<()> {
    let mut line = String::new();
    loop {
        write!(output, "query> ")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            break;
        }

        let options = SearchOptions {
            query: query.to_string(),
            ..options.clone()
        };
        match execute_search(engine, &options) {
            Ok(hits) => write!(output, "{}", format_human(&hits))?,
            Err(err) if err.is_recoverable() => {
                writeln!(output, "{err}")?;
            }
            Err(err) => return Err(err),
        }
    }

    Ok(())
}
