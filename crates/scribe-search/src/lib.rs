//! Full-text search over notes, backed by Tantivy.
//!
//! The index is a projection of the note store: one document per note, keyed
//! by the stringified note id, carrying the note content and its author's
//! display name. It is never authoritative. [`NoteIndex`] serves live writes
//! and queries; [`IndexBuilder`] produces a fresh index in one batch.

use std::path::Path;
use std::sync::Mutex;

use scribe_types::models::{NoteId, SearchHit};
use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::directory::error::LockError;
use tantivy::query::QueryParser;
use tantivy::schema::document::Value;
use tantivy::schema::{Field, INDEXED, STORED, STRING, Schema, TEXT};
use tantivy::{
    DateTime, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, TantivyError, Term,
    doc,
};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Writer heap for the live index (50 MB).
const WRITER_HEAP_SIZE: usize = 50_000_000;

/// Writer heap for batch rebuilds (100 MB, split over two threads).
const BUILDER_HEAP_SIZE: usize = 100_000_000;
const BUILDER_THREADS: usize = 2;

/// Smallest heap tantivy accepts; the locking writer never indexes anything.
const LOCK_HEAP_SIZE: usize = 15_000_000;

#[derive(Error, Debug)]
pub enum IndexError {
    /// Failed to create, open or reload the index.
    #[error("index error: {0}")]
    Open(String),

    /// The free-text query could not be parsed.
    #[error("query parse error: {0}")]
    Query(String),

    /// Failed to execute a search or load a hit.
    #[error("search error: {0}")]
    Search(String),

    /// Failed to add or commit a document.
    #[error("indexing error: {0}")]
    Write(String),

    /// Another writer, in this process or another, holds the index.
    #[error("index is locked by another writer: {0}")]
    Busy(String),

    #[error("index directory error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal lock error")]
    LockPoisoned,
}

impl<T> From<std::sync::PoisonError<T>> for IndexError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        IndexError::LockPoisoned
    }
}

fn writer_error(err: TantivyError) -> IndexError {
    match err {
        TantivyError::LockFailure(LockError::LockBusy, _) => IndexError::Busy(err.to_string()),
        _ => IndexError::Open(format!("failed to create writer: {}", err)),
    }
}

/// What the index knows about a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDocument {
    pub id: NoteId,
    pub author: String,
    pub content: String,
    /// Unix seconds.
    pub created: i64,
}

#[derive(Clone, Copy)]
struct NoteFields {
    id: Field,
    author: Field,
    content: Field,
    created: Field,
}

impl NoteFields {
    fn from_schema(schema: &Schema) -> Result<Self, IndexError> {
        let field = |name: &str| {
            schema
                .get_field(name)
                .map_err(|e| IndexError::Open(format!("index schema lacks `{}`: {}", name, e)))
        };
        Ok(Self {
            id: field("id")?,
            author: field("author")?,
            content: field("content")?,
            created: field("created")?,
        })
    }

    fn document(&self, note: &NoteDocument) -> TantivyDocument {
        doc!(
            self.id => note.id.to_string(),
            self.author => note.author.clone(),
            self.content => note.content.clone(),
            self.created => DateTime::from_timestamp_secs(note.created),
        )
    }
}

fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();

    // id: raw string, the only stored field
    schema_builder.add_text_field("id", STRING | STORED);
    schema_builder.add_text_field("author", TEXT);
    schema_builder.add_text_field("content", TEXT);
    schema_builder.add_date_field("created", INDEXED | STORED);

    schema_builder.build()
}

/// Live note index.
pub struct NoteIndex {
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    fields: NoteFields,
    query_parser: QueryParser,
}

impl NoteIndex {
    /// Opens the index at `path`, creating an empty one if none exists.
    pub fn open_or_create(path: &Path) -> Result<Self, IndexError> {
        std::fs::create_dir_all(path)?;
        let directory = MmapDirectory::open(path)
            .map_err(|e| IndexError::Open(format!("failed to open directory: {}", e)))?;
        let index = Index::open_or_create(directory, build_schema())
            .map_err(|e| IndexError::Open(format!("failed to open/create index: {}", e)))?;

        info!("Search index opened at {}", path.display());
        Self::from_index(index)
    }

    /// Opens an existing index; fails if `path` holds none.
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        let index = Index::open_in_dir(path)
            .map_err(|e| IndexError::Open(format!("failed to open index: {}", e)))?;
        Self::from_index(index)
    }

    pub fn in_memory() -> Result<Self, IndexError> {
        Self::from_index(Index::create_in_ram(build_schema()))
    }

    fn from_index(index: Index) -> Result<Self, IndexError> {
        let fields = NoteFields::from_schema(&index.schema())?;

        let writer = index
            .writer_with_num_threads(1, WRITER_HEAP_SIZE)
            .map_err(writer_error)?;

        // Reloaded explicitly after each commit so writes are searchable on return.
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| IndexError::Open(format!("failed to create reader: {}", e)))?;

        // Unqualified terms match note text and author names alike.
        let query_parser = QueryParser::for_index(&index, vec![fields.content, fields.author]);

        Ok(Self {
            reader,
            writer: Mutex::new(writer),
            fields,
            query_parser,
        })
    }

    /// Adds or replaces the document for `note.id` and commits.
    pub fn index_note(&self, note: &NoteDocument) -> Result<(), IndexError> {
        let mut writer = self.writer.lock()?;
        let fields = self.fields;
        commit_or_rollback(&mut writer, |writer| {
            writer.delete_term(Term::from_field_text(fields.id, &note.id.to_string()));
            writer
                .add_document(fields.document(note))
                .map_err(|e| IndexError::Write(format!("failed to add document: {}", e)))?;
            writer
                .commit()
                .map_err(|e| IndexError::Write(format!("failed to commit: {}", e)))?;
            Ok(())
        })?;
        drop(writer);

        self.reload()?;
        debug!("Indexed note {}", note.id);
        Ok(())
    }

    /// Runs `query_str` through Tantivy's query parser unchanged, `content`
    /// being the default field. Hits come back best score first and are not
    /// filtered for visibility.
    pub fn search(&self, query_str: &str, limit: usize) -> Result<Vec<SearchHit>, IndexError> {
        if limit == 0 {
            return Ok(vec![]);
        }

        let query = self
            .query_parser
            .parse_query(query_str)
            .map_err(|e| IndexError::Query(format!("failed to parse query: {}", e)))?;

        let searcher = self.reader.searcher();
        let top_docs = searcher
            .search(&*query, &TopDocs::with_limit(limit))
            .map_err(|e| IndexError::Search(format!("search failed: {}", e)))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(doc_address)
                .map_err(|e| IndexError::Search(format!("failed to fetch doc: {}", e)))?;

            let id_str = doc
                .get_first(self.fields.id)
                .and_then(|v| v.as_str())
                .ok_or_else(|| IndexError::Search("missing id".to_string()))?;
            let note_id: NoteId = id_str
                .parse()
                .map_err(|e| IndexError::Search(format!("invalid id '{}': {}", id_str, e)))?;

            hits.push(SearchHit { note_id, score });
        }

        Ok(hits)
    }

    pub fn doc_count(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    pub fn reload(&self) -> Result<(), IndexError> {
        self.reader
            .reload()
            .map_err(|e| IndexError::Open(format!("failed to reload reader: {}", e)))
    }
}

/// Runs `ops` against the writer. On error every operation queued since the
/// last commit is discarded, so a half-applied upsert cannot ride along with
/// the next successful commit.
fn commit_or_rollback<F>(writer: &mut IndexWriter, ops: F) -> Result<(), IndexError>
where
    F: FnOnce(&mut IndexWriter) -> Result<(), IndexError>,
{
    if let Err(e) = ops(writer) {
        if let Err(rollback) = writer.rollback() {
            warn!("Index rollback failed: {}", rollback);
        }
        return Err(e);
    }
    Ok(())
}

/// Holds the writer lock of an on-disk index, keeping live writers out while
/// the directory is replaced. Released on drop.
pub struct WriterLock {
    _writer: IndexWriter,
}

impl WriterLock {
    /// Returns `None` when `path` holds no index yet. Fails with
    /// [`IndexError::Busy`] while any other writer has the index open.
    pub fn acquire(path: &Path) -> Result<Option<Self>, IndexError> {
        if !path.join("meta.json").exists() {
            return Ok(None);
        }
        let index = Index::open_in_dir(path)
            .map_err(|e| IndexError::Open(format!("failed to open index: {}", e)))?;
        let writer = index
            .writer_with_num_threads(1, LOCK_HEAP_SIZE)
            .map_err(writer_error)?;
        Ok(Some(Self { _writer: writer }))
    }
}

/// Writes a brand-new index into an empty directory in one batch.
pub struct IndexBuilder {
    writer: IndexWriter,
    fields: NoteFields,
    added: u64,
}

impl IndexBuilder {
    pub fn create(path: &Path) -> Result<Self, IndexError> {
        std::fs::create_dir_all(path)?;
        let index = Index::create_in_dir(path, build_schema())
            .map_err(|e| IndexError::Open(format!("failed to create index: {}", e)))?;
        let fields = NoteFields::from_schema(&index.schema())?;
        let writer = index
            .writer_with_num_threads(BUILDER_THREADS, BUILDER_HEAP_SIZE)
            .map_err(writer_error)?;

        Ok(Self {
            writer,
            fields,
            added: 0,
        })
    }

    pub fn add(&mut self, note: &NoteDocument) -> Result<(), IndexError> {
        self.writer
            .add_document(self.fields.document(note))
            .map_err(|e| IndexError::Write(format!("failed to add document: {}", e)))?;
        self.added += 1;
        Ok(())
    }

    /// Commits everything added and waits for background merges. Returns the
    /// number of documents written.
    pub fn finish(mut self) -> Result<u64, IndexError> {
        self.writer
            .commit()
            .map_err(|e| IndexError::Write(format!("failed to commit: {}", e)))?;
        self.writer
            .wait_merging_threads()
            .map_err(|e| IndexError::Write(format!("failed to finish merges: {}", e)))?;
        Ok(self.added)
    }
}
