use rusqlite::ffi;
use scribe_types::models::{AuthorId, InvalidPrivacy, NoteId};
use thiserror::Error;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    InvalidPrivacy(#[from] InvalidPrivacy),

    #[error("author name already taken: {0}")]
    NameTaken(String),

    #[error("no author with id {0}")]
    UnknownAuthor(AuthorId),

    #[error("privacy update matches no user-note id pair: {author_id} {note_id}")]
    NotNoteAuthor { author_id: AuthorId, note_id: NoteId },
}

impl DbError {
    /// UNIQUE only; CHECK and NOT NULL failures are not name clashes.
    pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
        matches!(
            err,
            rusqlite::Error::SqliteFailure(e, _) if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
        )
    }
}
