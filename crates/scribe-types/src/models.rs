use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Store-assigned author identity (SQLite rowid).
pub type AuthorId = i64;

/// Store-assigned note identity (SQLite rowid).
pub type NoteId = i64;

/// Who may read a note.
///
/// Persisted and exchanged as its integer code: `0` private, `1` protected,
/// `2` public. Any other code is rejected before it reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Privacy {
    /// Author only.
    Private,
    /// Author plus every author the note's author shares with.
    #[default]
    Protected,
    /// Everyone.
    Public,
}

impl Privacy {
    pub const fn code(self) -> i64 {
        match self {
            Privacy::Private => 0,
            Privacy::Protected => 1,
            Privacy::Public => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal privacy mode: {0}")]
pub struct InvalidPrivacy(pub i64);

impl TryFrom<i64> for Privacy {
    type Error = InvalidPrivacy;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Privacy::Private),
            1 => Ok(Privacy::Protected),
            2 => Ok(Privacy::Public),
            other => Err(InvalidPrivacy(other)),
        }
    }
}

impl From<Privacy> for i64 {
    fn from(privacy: Privacy) -> Self {
        privacy.code()
    }
}

/// Public view of an author. The credential hash never leaves the store crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: AuthorId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub author_id: AuthorId,
    pub content: String,
    /// Unix seconds.
    pub created_at: i64,
    pub privacy: Privacy,
    /// Presentation tag, opaque to the server.
    pub render_hint: i64,
}

/// A note as submitted by its author, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNote {
    pub author_id: AuthorId,
    pub content: String,
    pub created_at: i64,
    pub privacy: Privacy,
    pub render_hint: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteTitle {
    pub id: NoteId,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub note_id: NoteId,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privacy_codes_round_trip() {
        for privacy in [Privacy::Private, Privacy::Protected, Privacy::Public] {
            assert_eq!(Privacy::try_from(privacy.code()), Ok(privacy));
        }
    }

    #[test]
    fn out_of_range_privacy_is_rejected() {
        assert_eq!(Privacy::try_from(3), Err(InvalidPrivacy(3)));
        assert_eq!(Privacy::try_from(-1), Err(InvalidPrivacy(-1)));
    }

    #[test]
    fn default_privacy_is_protected() {
        assert_eq!(Privacy::default(), Privacy::Protected);
    }

    #[test]
    fn privacy_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Privacy::Public).unwrap(), "2");
        assert!(serde_json::from_str::<Privacy>("7").is_err());
    }
}
