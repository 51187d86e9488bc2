//! Note visibility.
//!
//! A viewer may read a note when it is public, when they wrote it, or when it
//! is protected and its author shares with them. Every read query in this
//! crate embeds [`VISIBLE_TO_VIEWER`] so rows the viewer may not see are never
//! fetched in the first place.

/// SQL predicate over a `notes` row aliased `n`. The viewer's id is always
/// bound as `?1`.
///
/// The `n.author_id = ?1` arm is redundant with the self-sharing edge written
/// at registration, but keeps PRIVATE notes readable by their author.
pub const VISIBLE_TO_VIEWER: &str = "(n.privacy = 2 \
     OR n.author_id = ?1 \
     OR (n.privacy = 1 AND EXISTS ( \
         SELECT 1 FROM sharing s WHERE s.sharer_id = n.author_id AND s.sharee_id = ?1)))";

#[cfg(test)]
mod tests {
    use crate::Database;
    use scribe_types::models::{AuthorId, NewNote, Privacy};

    /// The rule the SQL predicate encodes, written out case by case.
    fn is_visible(
        viewer: AuthorId,
        author: AuthorId,
        privacy: Privacy,
        author_shares_with_viewer: bool,
    ) -> bool {
        match privacy {
            Privacy::Public => true,
            _ if author == viewer => true,
            Privacy::Protected => author_shares_with_viewer,
            Privacy::Private => false,
        }
    }

    #[test]
    fn private_is_author_only() {
        assert!(is_visible(1, 1, Privacy::Private, true));
        assert!(!is_visible(2, 1, Privacy::Private, true));
    }

    #[test]
    fn protected_requires_sharing_edge() {
        assert!(is_visible(2, 1, Privacy::Protected, true));
        assert!(!is_visible(2, 1, Privacy::Protected, false));
        assert!(is_visible(1, 1, Privacy::Protected, false));
    }

    #[test]
    fn public_is_visible_to_anyone() {
        assert!(is_visible(42, 1, Privacy::Public, false));
    }

    #[test]
    fn sql_predicate_agrees_with_is_visible() {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_author("alice", "x").unwrap();
        let bob = db.create_author("bob", "x").unwrap();
        let carol = db.create_author("carol", "x").unwrap();
        db.share_with(alice, bob).unwrap();

        let authors = [alice, bob, carol];
        let mut notes = Vec::new();
        for &author in &authors {
            for privacy in [Privacy::Private, Privacy::Protected, Privacy::Public] {
                let id = db
                    .create_note(&NewNote {
                        author_id: author,
                        content: format!("{author} {privacy:?}"),
                        created_at: 0,
                        privacy,
                        render_hint: 0,
                    })
                    .unwrap();
                notes.push((id, author, privacy));
            }
        }

        for &viewer in &authors {
            for &(id, author, privacy) in &notes {
                let shared = (author == alice && viewer == bob) || author == viewer;
                let expected = is_visible(viewer, author, privacy, shared);
                let fetched = db.get_note(viewer, id).unwrap().is_some();
                assert_eq!(
                    fetched, expected,
                    "viewer {viewer} note {id} by {author} ({privacy:?})"
                );
            }
        }
    }
}
