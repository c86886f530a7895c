use tantivy::query::{Query, QueryParser};

use crate::{engine::SearchEngine, error::Result};

/// Boolean operators passed through untouched. Matching is exact, so a
/// mixed-case `And` is an ordinary term and gets the wildcard treatment.
const OPERATORS: &[&str] = &["AND", "OR", "NOT", "and", "or", "not"];

/// Rewrite user input into the engine's query syntax.
///
/// Blank input means "no query" and returns `None`. In phrase mode the
/// whole input becomes a single quoted phrase, normalizing at most one
/// pre-existing quote at each end. Otherwise each whitespace-separated
/// token is rewritten on its own and the result is joined with single
/// spaces: operators and quoted tokens pass through, every other term
/// gets a trailing `*` unless it already carries one.
pub fn rewrite_query(raw: &str, phrase: bool) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if phrase {
        let inner = trimmed.strip_prefix('"').unwrap_or(trimmed);
        let inner = inner.strip_suffix('"').unwrap_or(inner);
        return Some(format!("\"{inner}\""));
    }

    let rewritten = trimmed
        .split_whitespace()
        .map(rewrite_token)
        .collect::<Vec<_>>()
        .join(" ");

    Some(rewritten)
}

fn rewrite_token(token: &str) -> String {
    if OPERATORS.contains(&token) {
        return token.to_string();
    }

    if token.starts_with('"') && token.ends_with('"') {
        return token.to_string();
    }

    if let Some((field, value)) = token.split_once(':') {
        if value.contains('*') {
            return token.to_string();
        }
        return format!("{field}:{value}*");
    }

    if token.contains('*') {
        return token.to_string();
    }

    format!("{token}*")
}

/// Rewrite and parse a query against the engine's schema.
///
/// `Ok(None)` means blank input. Parse failures surface as recoverable
/// query-syntax errors; an unknown `field` name is a configuration
/// error instead.
///
/// The engine's analyzers drop the rewriter's `*` markers, so the
/// wildcard semantics come from the parser itself: tokenized fields
/// are configured with zero-distance prefix fuzzy, which compiles bare
/// term literals to prefix matches. Phrases and the raw `filepath` and
/// `modified` fields stay exact. Phrase mode parses without any fuzzy
/// at all.
pub fn build_query(
    engine: &SearchEngine,
    raw: &str,
    phrase: bool,
    field: Option<&str>,
) -> Result<Option<Box<dyn Query>>> {
    let Some(rewritten) = rewrite_query(raw, phrase) else {
        return Ok(None);
    };

    tracing::debug!(raw, %rewritten, "query rewritten");

    let fields = match field {
        Some(name) => vec![engine.resolve_search_field(name)?],
        None => engine.default_search_fields(),
    };

    let mut parser = QueryParser::for_index(engine.index(), fields.clone());
    if !phrase {
        let f = engine.fields();
        for &field in &fields {
            if field != f.filepath && field != f.modified {
                parser.set_field_fuzzy(field, true, 0, false);
            }
        }
    }
    let query = parser.parse_query(&rewritten)?;

    Ok(Some(query))
}
