use scribe_db::DbError;
use scribe_search::IndexError;
use scribe_types::models::InvalidPrivacy;
use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

/// Every failure a caller of the note service can observe.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Absent, or present but not visible to the caller. The two are
    /// deliberately indistinguishable.
    #[error("not found")]
    NotFound,

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("not authorized: {0}")]
    Authorization(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store failure: {0}")]
    Store(String),

    #[error("search index failure: {0}")]
    Index(String),
}

impl From<DbError> for CoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::InvalidPrivacy(e) => CoreError::Validation(e.to_string()),
            DbError::NameTaken(_) => CoreError::Conflict(err.to_string()),
            DbError::UnknownAuthor(_) => CoreError::NotFound,
            DbError::NotNoteAuthor { .. } => CoreError::Authorization(err.to_string()),
            DbError::Sqlite(_) | DbError::Io(_) | DbError::LockPoisoned => {
                CoreError::Store(err.to_string())
            }
        }
    }
}

impl From<IndexError> for CoreError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::Query(_) => CoreError::Validation(err.to_string()),
            _ => CoreError::Index(err.to_string()),
        }
    }
}

impl From<InvalidPrivacy> for CoreError {
    fn from(err: InvalidPrivacy) -> Self {
        CoreError::Validation(err.to_string())
    }
}
