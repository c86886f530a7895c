use std::{collections::HashMap, path::Path};

use tantivy::{
    DocAddress,
    Index,
    IndexReader,
    IndexWriter,
    TantivyDocument,
    Term,
    collector::TopDocs,
    doc,
    query::Query,
    schema::*,
};

use crate::{
    document::CorpusDocument,
    error::{Error, Result},
};

/// Field names used in the schema. These are also the names users may
/// qualify query terms with, e.g. `author:melville`.
pub mod fields {
    pub const CONTENT: &str = "content";
    pub const STEMMED: &str = "stemcontent";
    pub const FILTERED: &str = "stopcontent";
    pub const AUTHOR: &str = "author";
    pub const TITLE: &str = "title";
    pub const FILENAME: &str = "filename";
    pub const FILEPATH: &str = "filepath";
    pub const MODIFIED: &str = "modified";
}

/// Memory budget handed to the tantivy writer.
const WRITER_MEMORY_BUDGET: usize = 15_000_000;

/// The index side of the system: owns the tantivy index and exposes the
/// mutation, snapshot and search primitives the pipeline runs against.
pub struct SearchEngine {
    index: Index,
    reader: IndexReader,
    fields: SchemaFields,
}

/// Resolved field handles for the schema.
#[derive(Clone, Copy)]
pub struct SchemaFields {
    pub content: Field,
    pub stemmed: Field,
    pub filtered: Field,
    pub author: Field,
    pub title: Field,
    pub filename: Field,
    pub filepath: Field,
    pub modified: Field,
}

/// One ranked search hit with its stored metadata.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchHit {
    pub score: f32,
    pub identity: String,
    pub title: String,
    pub author: String,
    pub filename: String,
    pub modified: u64,
    /// Scoring breakdown, present when explain output was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

fn build_schema() -> (Schema, SchemaFields) {
    let mut builder = Schema::builder();

    let content = builder.add_text_field(fields::CONTENT, TEXT | STORED);
    let stemmed = builder.add_text_field(fields::STEMMED, TEXT | STORED);
    let filtered = builder.add_text_field(fields::FILTERED, TEXT | STORED);
    let author = builder.add_text_field(fields::AUTHOR, TEXT | STORED);
    let title = builder.add_text_field(fields::TITLE, TEXT | STORED);
    let filename = builder.add_text_field(fields::FILENAME, TEXT | STORED);

    // Raw fields: the identity must stay a single exact term so deletes
    // hit precisely, and the fingerprint is stored as a decimal string.
    let filepath = builder.add_text_field(fields::FILEPATH, STRING | STORED);
    let modified = builder.add_text_field(fields::MODIFIED, STRING | STORED);

    let schema = builder.build();
    let fields = SchemaFields {
        content,
        stemmed,
        filtered,
        author,
        title,
        filename,
        filepath,
        modified,
    };

    (schema, fields)
}

impl SearchEngine {
    /// Open or create an index at the given directory.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let (schema, fields) = build_schema();

        let mmap_dir = tantivy::directory::MmapDirectory::open(dir)
            .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?;
        let index = if Index::exists(&mmap_dir)
            .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?
        {
            Index::open(mmap_dir)?
        } else {
            Index::create(
                mmap_dir,
                schema,
                tantivy::IndexSettings::default(),
            )?
        };

        let reader = index.reader()?;

        Ok(Self {
            index,
            reader,
            fields,
        })
    }

    /// Create an in-memory index (for testing).
    pub fn open_in_ram() -> Result<Self> {
        let (schema, fields) = build_schema();
        let index = Index::create_in_ram(schema);
        let reader = index.reader()?;

        Ok(Self {
            index,
            reader,
            fields,
        })
    }

    /// Get the resolved field handles.
    pub fn fields(&self) -> SchemaFields {
        self.fields
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Create the run's single shared write handle.
    pub fn writer(&self) -> Result<IndexWriter> {
        Ok(self.index.writer(WRITER_MEMORY_BUDGET)?)
    }

    /// Add a document to the index via the given writer.
    pub fn add_document(
        &self,
        writer: &IndexWriter,
        document: &CorpusDocument,
    ) -> Result<()> {
        let f = self.fields;
        writer.add_document(doc!(
            f.content => document.content.as_str(),
            f.stemmed => document.stemmed_content.as_str(),
            f.filtered => document.filtered_content.as_str(),
            f.author => document.author.as_str(),
            f.title => document.title.as_str(),
            f.filename => document.filename.as_str(),
            f.filepath => document.identity.as_str(),
            f.modified => document.fingerprint.to_string(),
        ))?;
        Ok(())
    }

    /// Replace whatever the index holds for this document's identity.
    pub fn update_document(
        &self,
        writer: &IndexWriter,
        document: &CorpusDocument,
    ) -> Result<()> {
        self.delete_document(writer, &document.identity);
        self.add_document(writer, document)
    }

    /// Queue deletion of one identity. Takes effect at commit.
    pub fn delete_document(&self, writer: &IndexWriter, identity: &str) {
        let term = Term::from_field_text(self.fields.filepath, identity);
        writer.delete_term(term);
    }

    /// Enumerate the committed (identity, fingerprint) pairs.
    ///
    /// Reads the stored identity and fingerprint of every live document.
    /// Documents with a missing or unparsable fingerprint are skipped.
    pub fn snapshot(&self) -> Result<HashMap<String, u64>> {
        self.reader.reload()?;
        let searcher = self.reader.searcher();
        let f = self.fields;
        let mut snapshot = HashMap::new();

        for (ord, segment) in searcher.segment_readers().iter().enumerate() {
            let alive = segment.alive_bitset();
            for doc_id in 0..segment.max_doc() {
                if let Some(bitset) = alive
                    && !bitset.is_alive(doc_id)
                {
                    continue;
                }

                let address = DocAddress::new(ord as u32, doc_id);
                let doc: TantivyDocument = searcher.doc(address)?;
                if let Some(identity) =
                    doc.get_first(f.filepath).and_then(|v| v.as_str())
                    && let Some(fingerprint) = doc
                        .get_first(f.modified)
                        .and_then(|v| v.as_str())
                        .and_then(|s| s.parse().ok())
                {
                    snapshot.insert(identity.to_string(), fingerprint);
                }
            }
        }

        Ok(snapshot)
    }

    /// Number of live documents in the committed index.
    pub fn num_docs(&self) -> Result<u64> {
        self.reader.reload()?;
        Ok(self.reader.searcher().num_docs())
    }

    /// All fields a free query is matched against by default.
    pub fn default_search_fields(&self) -> Vec<Field> {
        let f = self.fields;
        vec![
            f.content, f.stemmed, f.filtered, f.author, f.title, f.filename,
            f.filepath, f.modified,
        ]
    }

    /// Resolve a user-facing field name. Unknown names are a
    /// configuration error, not a query-syntax one.
    pub fn resolve_search_field(&self, name: &str) -> Result<Field> {
        self.index
            .schema()
            .get_field(name)
            .map_err(|_| Error::Config(format!("unknown search field: {name}")))
    }

    /// Run a parsed query, returning up to `limit` ranked hits.
    pub fn search(
        &self,
        query: &dyn Query,
        limit: usize,
        explain: bool,
    ) -> Result<Vec<SearchHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        self.reader.reload()?;
        let searcher = self.reader.searcher();
        let f = self.fields;

        let top_docs = searcher.search(query, &TopDocs::with_limit(limit))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            let explanation = if explain {
                Some(query.explain(&searcher, doc_address)?.to_pretty_json())
            } else {
                None
            };
            hits.push(SearchHit {
                score,
                identity: extract_text(&doc, f.filepath),
                title: extract_text(&doc, f.title),
                author: extract_text(&doc, f.author),
                filename: extract_text(&doc, f.filename),
                modified: extract_text(&doc, f.modified)
                    .parse()
                    .unwrap_or(0),
                explanation,
            });
        }

        Ok(hits)
    }
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine").finish_non_exhaustive()
    }
}

fn extract_text(doc: &TantivyDocument, field: Field) -> String {
    doc.get_first(field)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}
