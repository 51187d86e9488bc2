//! Offline index maintenance: full rebuild from the store, and replay of
//! pending outbox entries into an existing index.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Instant;

use scribe_db::Database;
use scribe_db::models::IndexSourceRow;
use scribe_search::{IndexBuilder, NoteDocument, WriterLock};
use tracing::{info, warn};

use crate::{CoreError, CoreResult, SearchIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildReport {
    pub documents: u64,
    pub outbox_cleared: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairReport {
    pub reindexed: u64,
}

/// Builds a fresh index of every note at `target`.
///
/// The index is written to `<target>.building` and only swapped into place
/// once complete. Any failure, including a note whose author row is missing,
/// removes the staging directory and leaves `target` as it was.
///
/// The existing index's writer lock is held from start to swap, so a rebuild
/// against an index a running server still writes to fails up front.
pub fn rebuild_index(db: &Database, target: &Path) -> CoreResult<RebuildReport> {
    let started = Instant::now();
    let lock = WriterLock::acquire(target)?;

    let staging = sibling(target, "building");
    if staging.exists() {
        warn!("Removing stale staging index at {}", staging.display());
        std::fs::remove_dir_all(&staging).map_err(index_io)?;
    }

    let (documents, watermark) = match build_into(db, &staging) {
        Ok(built) => built,
        Err(e) => {
            discard(&staging);
            return Err(e);
        }
    };

    swap_into_place(&staging, target)?;
    drop(lock);
    let outbox_cleared = db.clear_index_outbox_through(watermark)?;

    let elapsed = started.elapsed().as_secs_f64();
    info!(
        "Rebuilt index at {}: {} documents in {:.1}s ({:.0} docs/s), {} outbox entries cleared",
        target.display(),
        documents,
        elapsed,
        documents as f64 / elapsed.max(f64::EPSILON),
        outbox_cleared
    );
    Ok(RebuildReport {
        documents,
        outbox_cleared,
    })
}

fn build_into(db: &Database, staging: &Path) -> CoreResult<(u64, i64)> {
    let mut builder = IndexBuilder::create(staging)?;
    let watermark = db.export_notes(|row| {
        builder.add(&document(row)?)?;
        Ok::<_, CoreError>(())
    })?;
    let documents = builder.finish()?;
    Ok((documents, watermark))
}

/// Indexes every note still waiting in the outbox and clears its entries.
pub fn repair_index<I: SearchIndex>(db: &Database, index: &I) -> CoreResult<RepairReport> {
    let mut reindexed = 0;
    for entry in db.pending_index_entries()? {
        let Some(row) = db.index_source(entry.note_id)? else {
            warn!("Outbox entry {} names missing note {}", entry.id, entry.note_id);
            db.mark_indexed(entry.note_id)?;
            continue;
        };

        let note_id = row.id;
        index.index_note(&document(row)?)?;
        db.mark_indexed(note_id)?;
        reindexed += 1;
    }

    info!("Index repair re-indexed {} notes", reindexed);
    Ok(RepairReport { reindexed })
}

/// A missing author means the store is corrupt; it is never skipped.
fn document(row: IndexSourceRow) -> CoreResult<NoteDocument> {
    let author = row.author_name.ok_or_else(|| {
        CoreError::Store(format!(
            "cannot find author {} of note {}",
            row.author_id, row.id
        ))
    })?;
    Ok(NoteDocument {
        id: row.id,
        author,
        content: row.content,
        created: row.created,
    })
}

fn swap_into_place(staging: &Path, target: &Path) -> CoreResult<()> {
    let previous = sibling(target, "previous");
    if previous.exists() {
        std::fs::remove_dir_all(&previous).map_err(index_io)?;
    }

    let had_target = target.exists();
    if had_target {
        std::fs::rename(target, &previous).map_err(index_io)?;
    }

    if let Err(e) = std::fs::rename(staging, target) {
        if had_target {
            if let Err(restore) = std::fs::rename(&previous, target) {
                warn!("Could not restore previous index: {}", restore);
            }
        }
        discard(staging);
        return Err(index_io(e));
    }

    if had_target {
        if let Err(e) = std::fs::remove_dir_all(&previous) {
            warn!("Could not remove previous index at {}: {}", previous.display(), e);
        }
    }
    Ok(())
}

fn discard(staging: &Path) {
    if let Err(e) = std::fs::remove_dir_all(staging) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove staging index at {}: {}", staging.display(), e);
        }
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn index_io(err: std::io::Error) -> CoreError {
    CoreError::Index(format!("index directory: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::tests::BrokenIndex;
    use crate::Notes;
    use scribe_search::NoteIndex;
    use scribe_types::models::{NewNote, Privacy};
    use tempfile::TempDir;

    fn add_note(db: &Database, author_id: i64, content: &str) -> i64 {
        db.create_note(&NewNote {
            author_id,
            content: content.into(),
            created_at: 0,
            privacy: Privacy::Protected,
            render_hint: 1,
        })
        .unwrap()
    }

    #[test]
    fn rebuild_indexes_every_note() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("test_index");
        let db = Database::open(&dir.path().join("notes.sqlite3")).unwrap();
        let author = db.create_author("Test User", "hash").unwrap();
        assert_eq!(author, 1);

        let mut ids = Vec::new();
        for content in ["hello", "ciao", "buonasera"] {
            ids.push(add_note(&db, author, content));
        }

        let report = rebuild_index(&db, &target).unwrap();
        assert_eq!(report, RebuildReport { documents: 3, outbox_cleared: 3 });
        assert_eq!(db.pending_index_count().unwrap(), 0);
        assert!(!sibling(&target, "building").exists());

        let index = NoteIndex::open(&target).unwrap();
        assert_eq!(index.doc_count(), 3);
        let hits = index.search("ciao", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].note_id, ids[1]);
    }

    #[test]
    fn rebuild_replaces_an_existing_index() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("idx");
        let db = Database::open_in_memory().unwrap();
        let author = db.create_author("Test User", "hash").unwrap();
        add_note(&db, author, "first");
        rebuild_index(&db, &target).unwrap();

        add_note(&db, author, "second");
        let report = rebuild_index(&db, &target).unwrap();
        assert_eq!(report.documents, 2);

        let index = NoteIndex::open(&target).unwrap();
        assert_eq!(index.search("second", 10).unwrap().len(), 1);
        assert!(!sibling(&target, "previous").exists());
    }

    #[test]
    fn dangling_author_fails_the_whole_rebuild() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("idx");
        let db = Database::open_in_memory().unwrap();
        let author = db.create_author("Test User", "hash").unwrap();
        add_note(&db, author, "kept");
        rebuild_index(&db, &target).unwrap();

        add_note(&db, 42, "orphan");
        let err = rebuild_index(&db, &target).unwrap_err();
        assert!(matches!(err, CoreError::Store(ref m) if m.contains("author 42")));

        // Old index intact, no staging left behind, outbox untouched.
        assert!(!sibling(&target, "building").exists());
        let index = NoteIndex::open(&target).unwrap();
        assert_eq!(index.doc_count(), 1);
        assert_eq!(db.pending_index_count().unwrap(), 1);
    }

    #[test]
    fn rebuild_refuses_an_index_in_live_use() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("idx");
        let db = Database::open_in_memory().unwrap();
        let author = db.create_author("Test User", "hash").unwrap();
        add_note(&db, author, "before");
        rebuild_index(&db, &target).unwrap();

        let live = NoteIndex::open(&target).unwrap();
        add_note(&db, author, "during");
        let err = rebuild_index(&db, &target).unwrap_err();
        assert!(matches!(err, CoreError::Index(ref m) if m.contains("locked")));

        // The live index keeps working and the outbox still owes the new note.
        assert!(!sibling(&target, "building").exists());
        assert_eq!(db.pending_index_count().unwrap(), 1);
        assert_eq!(live.search("before", 10).unwrap().len(), 1);
        drop(live);

        let report = rebuild_index(&db, &target).unwrap();
        assert_eq!(report.documents, 2);
    }

    #[test]
    fn repair_replays_missed_index_writes() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("notes.sqlite3");
        let index_path = dir.path().join("idx");

        // Writes made while the index was failing.
        let id = {
            let notes = Notes::new(Database::open(&db_path).unwrap(), BrokenIndex);
            let alice = notes.create_author("alice", "pw").unwrap();
            notes
                .create_note(NewNote {
                    author_id: alice,
                    content: "recovered words".into(),
                    created_at: 5,
                    privacy: Privacy::Public,
                    render_hint: 0,
                })
                .unwrap()
        };

        let db = Database::open(&db_path).unwrap();
        let index = NoteIndex::open_or_create(&index_path).unwrap();
        assert!(index.search("recovered", 10).unwrap().is_empty());

        let report = repair_index(&db, &index).unwrap();
        assert_eq!(report, RepairReport { reindexed: 1 });
        assert_eq!(db.pending_index_count().unwrap(), 0);
        assert_eq!(index.search("recovered", 10).unwrap()[0].note_id, id);

        // Nothing left to do.
        assert_eq!(repair_index(&db, &index).unwrap().reindexed, 0);
    }

    #[test]
    fn repair_stops_on_dangling_author() {
        let db = Database::open_in_memory().unwrap();
        let index = NoteIndex::in_memory().unwrap();
        add_note(&db, 7, "nobody wrote this");

        assert!(matches!(repair_index(&db, &index), Err(CoreError::Store(_))));
        assert_eq!(db.pending_index_count().unwrap(), 1);
    }

    #[test]
    fn sibling_appends_suffix() {
        assert_eq!(
            sibling(Path::new("data/notes.index"), "building"),
            PathBuf::from("data/notes.index.building")
        );
    }
}
