/// Database row types that do not cross the crate boundary as domain models.
use scribe_types::models::{Author, AuthorId, NoteId};

pub struct AuthorRow {
    pub id: AuthorId,
    pub name: String,
    /// Argon2 PHC string.
    pub secret: String,
}

impl From<AuthorRow> for Author {
    fn from(row: AuthorRow) -> Self {
        Author {
            id: row.id,
            name: row.name,
        }
    }
}

/// A note joined with its author's display name, as fed to the search index.
/// `author_name` is `None` when the author row is missing.
pub struct IndexSourceRow {
    pub id: NoteId,
    pub author_id: AuthorId,
    pub author_name: Option<String>,
    pub content: String,
    pub created: i64,
}

pub struct OutboxRow {
    pub id: i64,
    pub note_id: NoteId,
}
