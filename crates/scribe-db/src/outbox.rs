//! Pending search-index work.
//!
//! [`Database::create_note`] records an outbox row in the same transaction as
//! the note. The row is removed once the note's document is committed to the
//! search index, so any row still present marks a note the index may be
//! missing.

use rusqlite::{Connection, OptionalExtension, Row, params};
use scribe_types::models::NoteId;

use crate::models::{IndexSourceRow, OutboxRow};
use crate::{Database, DbError, DbResult};

const INDEX_SOURCE_SELECT: &str = "SELECT n.id, n.author_id, a.name, n.content, n.created
     FROM notes n
     LEFT JOIN authors a ON a.id = n.author_id";

impl Database {
    pub fn pending_index_count(&self) -> DbResult<u64> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM index_outbox", [], |r| r.get(0))?;
            Ok(count as u64)
        })
    }

    /// Oldest first.
    pub fn pending_index_entries(&self) -> DbResult<Vec<OutboxRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, note_id FROM index_outbox ORDER BY id")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(OutboxRow {
                        id: row.get(0)?,
                        note_id: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Clears every outbox row for `note_id`.
    pub fn mark_indexed(&self, note_id: NoteId) -> DbResult<()> {
        self.with_conn_mut(|conn| {
            conn.execute("DELETE FROM index_outbox WHERE note_id = ?1", [note_id])?;
            Ok(())
        })
    }

    /// Clears outbox rows up to and including `watermark`, returning how many went.
    pub fn clear_index_outbox_through(&self, watermark: i64) -> DbResult<u64> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute("DELETE FROM index_outbox WHERE id <= ?1", [watermark])?;
            Ok(removed as u64)
        })
    }

    /// A single note joined with its author's name, bypassing visibility.
    /// For index maintenance only.
    pub fn index_source(&self, note_id: NoteId) -> DbResult<Option<IndexSourceRow>> {
        self.with_conn(|conn| {
            let sql = format!("{INDEX_SOURCE_SELECT} WHERE n.id = ?1");
            let row = conn.query_row(&sql, [note_id], index_source_row).optional()?;
            Ok(row)
        })
    }

    /// Streams every note, in id order, to `f` in a single pass over one read
    /// transaction, and returns the outbox watermark taken in that same
    /// snapshot. Outbox rows at or below the watermark are covered by the
    /// streamed notes. Stops at the first error `f` returns.
    pub fn export_notes<F, E>(&self, mut f: F) -> Result<i64, E>
    where
        F: FnMut(IndexSourceRow) -> Result<(), E>,
        E: From<DbError>,
    {
        let conn = self.reader()?;
        let tx = conn.unchecked_transaction().map_err(DbError::from)?;

        let watermark = outbox_watermark(&tx).map_err(DbError::from)?;

        let sql = format!("{INDEX_SOURCE_SELECT} ORDER BY n.id");
        let mut stmt = tx.prepare(&sql).map_err(DbError::from)?;
        let mut rows = stmt.query([]).map_err(DbError::from)?;
        while let Some(row) = rows.next().map_err(DbError::from)? {
            f(index_source_row(row).map_err(DbError::from)?)?;
        }

        Ok(watermark)
    }
}

fn outbox_watermark(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COALESCE(MAX(id), 0) FROM index_outbox", params![], |r| {
        r.get(0)
    })
}

fn index_source_row(row: &Row<'_>) -> rusqlite::Result<IndexSourceRow> {
    Ok(IndexSourceRow {
        id: row.get(0)?,
        author_id: row.get(1)?,
        author_name: row.get(2)?,
        content: row.get(3)?,
        created: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_types::models::{NewNote, Privacy};

    fn add_note(db: &Database, author_id: i64, content: &str) -> NoteId {
        db.create_note(&NewNote {
            author_id,
            content: content.into(),
            created_at: 0,
            privacy: Privacy::Private,
            render_hint: 1,
        })
        .unwrap()
    }

    #[test]
    fn create_note_enqueues_and_mark_indexed_clears() {
        let db = Database::open_in_memory().unwrap();
        let author = db.create_author("Test User", "hash").unwrap();
        let a = add_note(&db, author, "a");
        let b = add_note(&db, author, "b");

        assert_eq!(db.pending_index_count().unwrap(), 2);

        db.mark_indexed(a).unwrap();
        let pending: Vec<NoteId> = db
            .pending_index_entries()
            .unwrap()
            .into_iter()
            .map(|r| r.note_id)
            .collect();
        assert_eq!(pending, vec![b]);
    }

    #[test]
    fn export_streams_all_notes_with_author_names() {
        let db = Database::open_in_memory().unwrap();
        let author = db.create_author("Test User", "hash").unwrap();
        add_note(&db, author, "hello");
        add_note(&db, 99, "orphan");

        let mut seen = Vec::new();
        let watermark = db
            .export_notes(|row| {
                seen.push((row.content, row.author_name));
                Ok::<_, DbError>(())
            })
            .unwrap();

        assert_eq!(
            seen,
            vec![
                ("hello".to_string(), Some("Test User".to_string())),
                ("orphan".to_string(), None),
            ]
        );
        assert_eq!(watermark, 2);
        assert_eq!(db.clear_index_outbox_through(watermark).unwrap(), 2);
        assert_eq!(db.pending_index_count().unwrap(), 0);
    }

    #[test]
    fn watermark_spares_later_entries() {
        let db = Database::open_in_memory().unwrap();
        let author = db.create_author("Test User", "hash").unwrap();
        add_note(&db, author, "before");

        let watermark = db.export_notes(|_| Ok::<_, DbError>(())).unwrap();
        let late = add_note(&db, author, "after");

        db.clear_index_outbox_through(watermark).unwrap();
        let pending = db.pending_index_entries().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].note_id, late);
    }

    #[test]
    fn index_source_ignores_visibility() {
        let db = Database::open_in_memory().unwrap();
        let author = db.create_author("Test User", "hash").unwrap();
        let id = add_note(&db, author, "private words");

        let row = db.index_source(id).unwrap().unwrap();
        assert_eq!(row.author_name.as_deref(), Some("Test User"));
        assert!(db.index_source(id + 1).unwrap().is_none());
    }
}
