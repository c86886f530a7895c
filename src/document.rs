use std::{
    fs::File,
    io::{BufRead, BufReader},
};

use tantivy::tokenizer::{
    Language,
    LowerCaser,
    SimpleTokenizer,
    Stemmer,
    TextAnalyzer,
    TokenStream,
};

use crate::{error::Result, scanner::ScannedFile};

/// Line prefixes that carry document metadata. The text after the first
/// occurrence of each marker becomes the field value.
const AUTHOR_MARKER: &str = "Author:";
const TITLE_MARKER: &str = "Title:";

/// Stop words removed from the filtered content variant.
const STOP_WORDS: &[&str] =
    &["the", "a", "an", "is", "of", "and", "or", "in", "to"];

/// Start/end line markers bounding the capturable body of a document.
///
/// When present, only lines strictly between a line containing `start`
/// and a line containing `end` are captured as content. Marker lines
/// themselves are skipped, and the end marker stops reading entirely.
#[derive(Debug, Clone)]
pub struct BlockMarkers {
    pub start: String,
    pub end: String,
}

impl BlockMarkers {
    /// The stock marker pair used by Project Gutenberg ebooks.
    pub fn gutenberg() -> Self {
        Self {
            start: "*** START OF THE PROJECT GUTENBERG EBOOK".to_string(),
            end: "*** END OF THE PROJECT GUTENBERG EBOOK".to_string(),
        }
    }
}

/// One fully built corpus document, ready to hand to the index.
#[derive(Debug, Clone)]
pub struct CorpusDocument {
    /// Absolute file path; the index join key.
    pub identity: String,
    /// Bare file name, also the fallback title.
    pub filename: String,
    pub author: String,
    pub title: String,
    /// Captured lines joined with newlines.
    pub content: String,
    /// Content run through the stemming pipeline.
    pub stemmed_content: String,
    /// Content with stop words removed.
    pub filtered_content: String,
    /// Last-modified time in epoch seconds at scan time.
    pub fingerprint: u64,
}

/// Read `file` and build its document.
///
/// Metadata markers are scanned on every line read, including lines
/// before a capture block opens, so headers outside the block still
/// populate author/title. Missing author defaults to "Unknown"; missing
/// title defaults to the file name.
pub fn build_document(
    file: &ScannedFile,
    markers: Option<&BlockMarkers>,
) -> Result<CorpusDocument> {
    let reader = BufReader::new(File::open(&file.path)?);

    let mut author = String::new();
    let mut title = String::new();
    let mut lines: Vec<String> = Vec::new();
    let mut in_block = markers.is_none();

    for line in reader.lines() {
        let line = line?;

        if let Some(m) = markers {
            if line.contains(&m.start) {
                in_block = true;
                continue;
            }
            if line.contains(&m.end) {
                break;
            }
        }

        if author.is_empty()
            && let Some(idx) = line.find(AUTHOR_MARKER)
        {
            author = line[idx + AUTHOR_MARKER.len()..].trim().to_string();
        }
        if title.is_empty()
            && let Some(idx) = line.find(TITLE_MARKER)
        {
            title = line[idx + TITLE_MARKER.len()..].trim().to_string();
        }

        if in_block {
            lines.push(line);
        }
    }

    let filename = file
        .path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file.identity.clone());

    if author.is_empty() {
        author = "Unknown".to_string();
    }
    if title.is_empty() {
        title = filename.clone();
    }

    let content = lines.join("\n");
    let stemmed_content = stem_text(&content);
    let filtered_content = strip_stop_words(&content);

    Ok(CorpusDocument {
        identity: file.identity.clone(),
        filename,
        author,
        title,
        content,
        stemmed_content,
        filtered_content,
        fingerprint: file.fingerprint,
    })
}

/// Lowercase, tokenize and stem `text`, rejoining tokens with spaces.
pub fn stem_text(text: &str) -> String {
    let mut analyzer = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(LowerCaser)
        .filter(Stemmer::new(Language::English))
        .build();

    let mut tokens: Vec<String> = Vec::new();
    let mut stream = analyzer.token_stream(text);
    while let Some(token) = stream.next() {
        tokens.push(token.text.clone());
    }
    tokens.join(" ")
}

/// Drop stop words from `text`, splitting on non-word characters and
/// rejoining the surviving tokens with single spaces. The stop-word
/// match is case-insensitive; kept tokens keep their original case.
pub fn strip_stop_words(text: &str) -> String {
    text.split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .filter(|token| !token.is_empty())
        .filter(|token| {
            !STOP_WORDS.contains(&token.to_ascii_lowercase().as_str())
        })
        .collect::<Vec<_>>()
        .join(" ")
}
