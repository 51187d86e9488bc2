use std::collections::HashSet;

use rusqlite::types::{ToSql, Type};
use rusqlite::{Connection, OptionalExtension, Row, params};
use scribe_types::models::{Author, AuthorId, NewNote, Note, NoteId, NoteTitle, Privacy};
use tracing::debug;

use crate::access::VISIBLE_TO_VIEWER;
use crate::models::AuthorRow;
use crate::{Database, DbError, DbResult};

/// Longest title returned by [`Database::get_titles`], in characters.
const MAX_TITLE_CHARS: usize = 80;

impl Database {
    // -- Authors --

    /// Inserts the author and the author's self-sharing edge in one transaction.
    pub fn create_author(&self, name: &str, secret_hash: &str) -> DbResult<AuthorId> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let inserted = tx.execute(
                "INSERT INTO authors (name, secret) VALUES (?1, ?2)",
                params![name, secret_hash],
            );
            match inserted {
                Err(e) if DbError::is_unique_violation(&e) => {
                    return Err(DbError::NameTaken(name.to_string()));
                }
                other => other?,
            };
            let author_id = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO sharing (sharer_id, sharee_id) VALUES (?1, ?1)",
                [author_id],
            )?;
            tx.commit()?;

            debug!("Created author {} ({})", author_id, name);
            Ok(author_id)
        })
    }

    pub fn get_author(&self, id: AuthorId) -> DbResult<Option<Author>> {
        self.with_conn(|conn| Ok(query_author_by_id(conn, id)?.map(Author::from)))
    }

    /// Includes the credential hash; used by login only.
    pub fn get_author_by_name(&self, name: &str) -> DbResult<Option<AuthorRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, name, secret FROM authors WHERE name = ?1",
                    [name],
                    author_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    // -- Notes --

    /// Inserts the note together with its pending-index marker.
    pub fn create_note(&self, note: &NewNote) -> DbResult<NoteId> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO notes (author_id, content, created, privacy, render_hint)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    note.author_id,
                    note.content,
                    note.created_at,
                    note.privacy.code(),
                    note.render_hint
                ],
            )?;
            let note_id = tx.last_insert_rowid();
            tx.execute("INSERT INTO index_outbox (note_id) VALUES (?1)", [note_id])?;
            tx.commit()?;
            Ok(note_id)
        })
    }

    /// `None` both when the note is absent and when the viewer may not see it.
    pub fn get_note(&self, viewer: AuthorId, note_id: NoteId) -> DbResult<Option<Note>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT n.id, n.author_id, n.content, n.created, n.privacy, n.render_hint
                 FROM notes n
                 WHERE n.id = ?2 AND {VISIBLE_TO_VIEWER}"
            );
            let note = conn
                .query_row(&sql, params![viewer, note_id], note_row)
                .optional()?;
            Ok(note)
        })
    }

    /// Newest first; notes created in the same second come out newest insert first.
    pub fn get_recent_notes(&self, viewer: AuthorId, limit: u32) -> DbResult<Vec<NoteId>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT n.id FROM notes n
                 WHERE {VISIBLE_TO_VIEWER}
                 ORDER BY n.created DESC, n.id DESC
                 LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let ids = stmt
                .query_map(params![viewer, limit], |row| row.get(0))?
                .collect::<Result<Vec<NoteId>, _>>()?;
            Ok(ids)
        })
    }

    /// Titles of the requested notes the viewer may see, in request order.
    /// Unknown and invisible ids are dropped.
    pub fn get_titles(&self, viewer: AuthorId, note_ids: &[NoteId]) -> DbResult<Vec<NoteTitle>> {
        if note_ids.is_empty() {
            return Ok(vec![]);
        }

        let mut found = self.with_conn(|conn| {
            query_visible(conn, viewer, note_ids, "n.id, n.content", |row| {
                let content: String = row.get(1)?;
                Ok(NoteTitle {
                    id: row.get(0)?,
                    title: title_of(&content),
                })
            })
        })?;

        let position = |id: NoteId| note_ids.iter().position(|&n| n == id);
        found.sort_by_key(|t| position(t.id));
        Ok(found)
    }

    /// The subset of `note_ids` the viewer may see.
    pub fn visible_note_ids(
        &self,
        viewer: AuthorId,
        note_ids: &[NoteId],
    ) -> DbResult<HashSet<NoteId>> {
        if note_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let ids = self.with_conn(|conn| {
            query_visible(conn, viewer, note_ids, "n.id", |row| row.get::<_, NoteId>(0))
        })?;
        Ok(ids.into_iter().collect())
    }

    /// Only the note's author may change its privacy. Out-of-range codes are
    /// rejected before the store is touched.
    pub fn set_note_privacy(&self, caller: AuthorId, note_id: NoteId, privacy: i64) -> DbResult<()> {
        let privacy = Privacy::try_from(privacy)?;

        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE notes SET privacy = ?1 WHERE id = ?2 AND author_id = ?3",
                params![privacy.code(), note_id, caller],
            )?;
            if updated == 0 {
                return Err(DbError::NotNoteAuthor {
                    author_id: caller,
                    note_id,
                });
            }
            Ok(())
        })
    }

    // -- Sharing --

    /// Idempotent: an existing edge is left as is.
    pub fn share_with(&self, sharer: AuthorId, sharee: AuthorId) -> DbResult<()> {
        self.with_conn_mut(|conn| {
            if query_author_by_id(conn, sharee)?.is_none() {
                return Err(DbError::UnknownAuthor(sharee));
            }
            conn.execute(
                "INSERT OR IGNORE INTO sharing (sharer_id, sharee_id) VALUES (?1, ?2)",
                params![sharer, sharee],
            )?;
            Ok(())
        })
    }

    /// Authors `sharer` shares with, excluding the self edge.
    pub fn list_sharees(&self, sharer: AuthorId) -> DbResult<Vec<AuthorId>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT sharee_id FROM sharing
                 WHERE sharer_id = ?1 AND sharee_id != sharer_id
                 ORDER BY sharee_id",
            )?;
            let ids = stmt
                .query_map([sharer], |row| row.get(0))?
                .collect::<Result<Vec<AuthorId>, _>>()?;
            Ok(ids)
        })
    }
}

pub(crate) fn query_author_by_id(conn: &Connection, id: AuthorId) -> DbResult<Option<AuthorRow>> {
    let row = conn
        .query_row(
            "SELECT id, name, secret FROM authors WHERE id = ?1",
            [id],
            author_row,
        )
        .optional()?;
    Ok(row)
}

/// Runs `SELECT <columns>` over the visible subset of `note_ids`.
fn query_visible<T, F>(
    conn: &Connection,
    viewer: AuthorId,
    note_ids: &[NoteId],
    columns: &str,
    map: F,
) -> DbResult<Vec<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let placeholders: Vec<String> = (0..note_ids.len()).map(|i| format!("?{}", i + 2)).collect();
    let sql = format!(
        "SELECT {columns} FROM notes n WHERE n.id IN ({}) AND {VISIBLE_TO_VIEWER}",
        placeholders.join(", ")
    );

    let mut params: Vec<&dyn ToSql> = Vec::with_capacity(note_ids.len() + 1);
    params.push(&viewer);
    params.extend(note_ids.iter().map(|id| id as &dyn ToSql));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params.as_slice(), map)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn author_row(row: &Row<'_>) -> rusqlite::Result<AuthorRow> {
    Ok(AuthorRow {
        id: row.get(0)?,
        name: row.get(1)?,
        secret: row.get(2)?,
    })
}

fn note_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        author_id: row.get(1)?,
        content: row.get(2)?,
        created_at: row.get(3)?,
        privacy: privacy_column(row, 4)?,
        render_hint: row.get(5)?,
    })
}

fn privacy_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Privacy> {
    let code: i64 = row.get(idx)?;
    Privacy::try_from(code)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

/// First non-blank line, markdown heading markers removed.
fn title_of(content: &str) -> String {
    let line = content
        .lines()
        .map(|l| l.trim_start_matches('#').trim())
        .find(|l| !l.is_empty())
        .unwrap_or("");
    line.chars().take(MAX_TITLE_CHARS).collect()
}
