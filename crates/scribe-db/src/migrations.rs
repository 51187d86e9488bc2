use rusqlite::Connection;
use tracing::info;

use crate::DbResult;

pub fn run(conn: &Connection) -> DbResult<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Note DB: running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE authors (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL UNIQUE,
                secret      TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- author_id deliberately carries no foreign key; callers populate it
            -- from an authenticated identity and the rebuild treats a dangling
            -- author as corruption.
            CREATE TABLE notes (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                author_id    INTEGER NOT NULL,
                content      TEXT NOT NULL,
                created      INTEGER NOT NULL,
                privacy      INTEGER NOT NULL DEFAULT 1 CHECK (privacy BETWEEN 0 AND 2),
                render_hint  INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX idx_notes_created ON notes(created DESC, id DESC);
            CREATE INDEX idx_notes_author ON notes(author_id);

            CREATE TABLE sharing (
                sharer_id   INTEGER NOT NULL,
                sharee_id   INTEGER NOT NULL,
                PRIMARY KEY (sharer_id, sharee_id)
            );

            CREATE INDEX idx_sharing_sharee ON sharing(sharee_id);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    if version < 2 {
        info!("Note DB: running migration v2 (index outbox)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE index_outbox (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                note_id      INTEGER NOT NULL,
                enqueued_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            );

            CREATE INDEX idx_index_outbox_note ON index_outbox(note_id);

            INSERT INTO schema_version (version) VALUES (2);

            COMMIT;
            ",
        )?;
    }

    Ok(())
}
