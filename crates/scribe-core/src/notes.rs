use scribe_db::Database;
use scribe_search::{IndexError, NoteDocument, NoteIndex};
use scribe_types::models::{Author, AuthorId, NewNote, Note, NoteId, NoteTitle, SearchHit};
use tracing::{debug, info, warn};

use crate::password::{hash_password, verify_password};
use crate::{CoreError, CoreResult};

/// Search hits fetched per hit requested, to leave room for hits the
/// viewer may not see.
const SEARCH_OVERFETCH: usize = 4;
const MIN_SEARCH_FETCH: usize = 50;

/// The full-text engine as seen by the note service.
pub trait SearchIndex: Send + Sync {
    /// Adds or replaces the note's document. Committed and searchable on `Ok`.
    fn index_note(&self, note: &NoteDocument) -> Result<(), IndexError>;

    /// Unfiltered hits, best score first.
    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, IndexError>;
}

impl SearchIndex for NoteIndex {
    fn index_note(&self, note: &NoteDocument) -> Result<(), IndexError> {
        NoteIndex::index_note(self, note)
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, IndexError> {
        NoteIndex::search(self, query, limit)
    }
}

/// Note service over the store and its search index.
///
/// Writes land in the store first. The search index is updated afterwards on
/// a best-effort basis: an index failure is logged and leaves the note's
/// outbox row in place for `scribe-indexer repair`, but never fails or undoes
/// the write.
pub struct Notes<I = NoteIndex> {
    db: Database,
    index: I,
}

impl<I: SearchIndex> Notes<I> {
    pub fn new(db: Database, index: I) -> Self {
        Self { db, index }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    // -- Authors --

    /// Registers an author. The password is hashed before it reaches the store.
    pub fn create_author(&self, name: &str, password: &str) -> CoreResult<AuthorId> {
        let secret = hash_password(password)?;
        let id = self.db.create_author(name, &secret)?;
        info!("Registered author {} ({})", id, name);
        Ok(id)
    }

    /// Unknown names and wrong passwords fail identically.
    pub fn verify_credentials(&self, name: &str, password: &str) -> CoreResult<Author> {
        let rejected = || CoreError::Authorization("bad credentials".to_string());

        let row = self.db.get_author_by_name(name)?.ok_or_else(rejected)?;
        if !verify_password(password, &row.secret) {
            return Err(rejected());
        }
        Ok(row.into())
    }

    pub fn get_author(&self, id: AuthorId) -> CoreResult<Author> {
        self.db.get_author(id)?.ok_or(CoreError::NotFound)
    }

    // -- Notes --

    /// Succeeds once the store has the note, whatever happens to the index.
    pub fn create_note(&self, note: NewNote) -> CoreResult<NoteId> {
        let id = self.db.create_note(&note)?;
        self.sync_index(id, &note);
        Ok(id)
    }

    fn sync_index(&self, id: NoteId, note: &NewNote) {
        let author = match self.db.get_author(note.author_id) {
            Ok(Some(author)) => author,
            Ok(None) => {
                warn!("Note {} has unknown author {}; left for repair", id, note.author_id);
                return;
            }
            Err(e) => {
                warn!("Author lookup for note {} failed: {}; left for repair", id, e);
                return;
            }
        };

        let doc = NoteDocument {
            id,
            author: author.name,
            content: note.content.clone(),
            created: note.created_at,
        };
        if let Err(e) = self.index.index_note(&doc) {
            warn!("Indexing note {} failed: {}; left for repair", id, e);
            return;
        }

        // A stale outbox row only costs a redundant re-index during repair.
        if let Err(e) = self.db.mark_indexed(id) {
            warn!("Note {} indexed but outbox not cleared: {}", id, e);
        }
    }

    /// `NotFound` whether the note is missing or hidden from `viewer`.
    pub fn get_note(&self, viewer: AuthorId, id: NoteId) -> CoreResult<Note> {
        self.db.get_note(viewer, id)?.ok_or(CoreError::NotFound)
    }

    pub fn recent_notes(&self, viewer: AuthorId, limit: u32) -> CoreResult<Vec<NoteId>> {
        Ok(self.db.get_recent_notes(viewer, limit)?)
    }

    pub fn titles(&self, viewer: AuthorId, ids: &[NoteId]) -> CoreResult<Vec<NoteTitle>> {
        Ok(self.db.get_titles(viewer, ids)?)
    }

    /// `privacy` is the raw code; anything outside 0..=2 is a validation error.
    pub fn set_note_privacy(&self, caller: AuthorId, id: NoteId, privacy: i64) -> CoreResult<()> {
        self.db.set_note_privacy(caller, id, privacy)?;
        debug!("Author {} set note {} privacy to {}", caller, id, privacy);
        Ok(())
    }

    // -- Sharing --

    pub fn share_with(&self, sharer: AuthorId, sharee: AuthorId) -> CoreResult<()> {
        self.db.share_with(sharer, sharee)?;
        debug!("Author {} shares with {}", sharer, sharee);
        Ok(())
    }

    pub fn list_sharees(&self, sharer: AuthorId) -> CoreResult<Vec<AuthorId>> {
        Ok(self.db.list_sharees(sharer)?)
    }

    // -- Search --

    /// Full-text search limited to notes `viewer` may read.
    ///
    /// The engine is asked for more hits than `limit`, the ids are checked
    /// against the store's visibility rules in one query, and the first
    /// `limit` visible hits are returned in engine score order.
    pub fn search(&self, viewer: AuthorId, query: &str, limit: usize) -> CoreResult<Vec<SearchHit>> {
        let fetch = limit.saturating_mul(SEARCH_OVERFETCH).max(MIN_SEARCH_FETCH);
        let hits = self.index.search(query, fetch)?;

        let ids: Vec<NoteId> = hits.iter().map(|h| h.note_id).collect();
        let visible = self.db.visible_note_ids(viewer, &ids)?;

        Ok(hits
            .into_iter()
            .filter(|h| visible.contains(&h.note_id))
            .take(limit)
            .collect())
    }

    pub fn pending_index_count(&self) -> CoreResult<u64> {
        Ok(self.db.pending_index_count()?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use scribe_types::models::Privacy;

    /// An index that rejects every write.
    pub(crate) struct BrokenIndex;

    impl SearchIndex for BrokenIndex {
        fn index_note(&self, _: &NoteDocument) -> Result<(), IndexError> {
            Err(IndexError::Write("disk full".into()))
        }

        fn search(&self, _: &str, _: usize) -> Result<Vec<SearchHit>, IndexError> {
            Err(IndexError::Search("unavailable".into()))
        }
    }

    fn service() -> Notes {
        Notes::new(Database::open_in_memory().unwrap(), NoteIndex::in_memory().unwrap())
    }

    fn new_note(author_id: AuthorId, content: &str, privacy: Privacy) -> NewNote {
        NewNote {
            author_id,
            content: content.to_string(),
            created_at: 1_700_000_000,
            privacy,
            render_hint: 0,
        }
    }

    #[test]
    fn registration_hashes_and_verifies() {
        let notes = service();
        let id = notes.create_author("alice", "hunter22").unwrap();

        let row = notes.db().get_author_by_name("alice").unwrap().unwrap();
        assert_ne!(row.secret, "hunter22");

        assert_eq!(notes.verify_credentials("alice", "hunter22").unwrap().id, id);
        assert!(matches!(
            notes.verify_credentials("alice", "wrong"),
            Err(CoreError::Authorization(_))
        ));
        assert!(matches!(
            notes.verify_credentials("nobody", "hunter22"),
            Err(CoreError::Authorization(_))
        ));
    }

    #[test]
    fn duplicate_registration_conflicts() {
        let notes = service();
        notes.create_author("alice", "pw").unwrap();
        assert!(matches!(
            notes.create_author("alice", "pw"),
            Err(CoreError::Conflict(_))
        ));
    }

    #[test]
    fn created_note_is_indexed_and_outbox_cleared() {
        let notes = service();
        let alice = notes.create_author("alice", "pw").unwrap();
        let id = notes
            .create_note(new_note(alice, "zanzibar itinerary", Privacy::Protected))
            .unwrap();

        let hits = notes.search(alice, "zanzibar", 10).unwrap();
        assert_eq!(hits.iter().map(|h| h.note_id).collect::<Vec<_>>(), vec![id]);
        assert_eq!(notes.pending_index_count().unwrap(), 0);
    }

    #[test]
    fn index_failure_keeps_the_note() {
        let notes = Notes::new(Database::open_in_memory().unwrap(), BrokenIndex);
        let alice = notes.create_author("alice", "pw").unwrap();

        let id = notes
            .create_note(new_note(alice, "still saved", Privacy::Private))
            .unwrap();

        assert_eq!(notes.get_note(alice, id).unwrap().content, "still saved");
        assert_eq!(notes.recent_notes(alice, 10).unwrap(), vec![id]);
        assert_eq!(notes.pending_index_count().unwrap(), 1);
        assert!(matches!(notes.search(alice, "still", 10), Err(CoreError::Index(_))));
    }

    #[test]
    fn hidden_and_missing_notes_look_the_same() {
        let notes = service();
        let alice = notes.create_author("alice", "pw").unwrap();
        let bob = notes.create_author("bob", "pw").unwrap();
        let id = notes.create_note(new_note(alice, "mine", Privacy::Private)).unwrap();

        assert!(matches!(notes.get_note(bob, id), Err(CoreError::NotFound)));
        assert!(matches!(notes.get_note(bob, id + 100), Err(CoreError::NotFound)));
    }

    #[test]
    fn search_hides_notes_the_viewer_cannot_read() {
        let notes = service();
        let alice = notes.create_author("alice", "pw").unwrap();
        let bob = notes.create_author("bob", "pw").unwrap();
        let private = notes.create_note(new_note(alice, "walrus private", Privacy::Private)).unwrap();
        let protected = notes
            .create_note(new_note(alice, "walrus protected", Privacy::Protected))
            .unwrap();
        let public = notes.create_note(new_note(alice, "walrus public", Privacy::Public)).unwrap();

        let ids = |viewer| {
            let mut ids: Vec<NoteId> = notes
                .search(viewer, "walrus", 10)
                .unwrap()
                .into_iter()
                .map(|h| h.note_id)
                .collect();
            ids.sort();
            ids
        };

        assert_eq!(ids(alice), vec![private, protected, public]);
        assert_eq!(ids(bob), vec![public]);

        notes.share_with(alice, bob).unwrap();
        assert_eq!(ids(bob), vec![protected, public]);
    }

    #[test]
    fn search_respects_limit_after_filtering() {
        let notes = service();
        let alice = notes.create_author("alice", "pw").unwrap();
        for _ in 0..5 {
            notes.create_note(new_note(alice, "repeated term", Privacy::Public)).unwrap();
        }
        assert_eq!(notes.search(alice, "repeated", 3).unwrap().len(), 3);
    }

    #[test]
    fn malformed_search_is_validation() {
        let notes = service();
        let alice = notes.create_author("alice", "pw").unwrap();
        assert!(matches!(
            notes.search(alice, "nosuchfield:x", 10),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn privacy_rules_for_non_authors_and_bad_codes() {
        let notes = service();
        let alice = notes.create_author("alice", "pw").unwrap();
        let bob = notes.create_author("bob", "pw").unwrap();
        let id = notes.create_note(new_note(alice, "n", Privacy::Private)).unwrap();

        assert!(matches!(
            notes.set_note_privacy(bob, id, 2),
            Err(CoreError::Authorization(_))
        ));
        assert!(matches!(
            notes.set_note_privacy(alice, id, 3),
            Err(CoreError::Validation(_))
        ));
        assert_eq!(notes.get_note(alice, id).unwrap().privacy, Privacy::Private);

        notes.set_note_privacy(alice, id, 2).unwrap();
        assert_eq!(notes.get_note(bob, id).unwrap().privacy, Privacy::Public);
    }

    #[test]
    fn sharing_twice_lists_sharee_once() {
        let notes = service();
        let alice = notes.create_author("alice", "pw").unwrap();
        let bob = notes.create_author("bob", "pw").unwrap();

        notes.share_with(alice, bob).unwrap();
        notes.share_with(alice, bob).unwrap();
        assert_eq!(notes.list_sharees(alice).unwrap(), vec![bob]);
        assert!(matches!(notes.share_with(alice, 999), Err(CoreError::NotFound)));
    }

    #[test]
    fn unknown_author_lookup() {
        let notes = service();
        assert!(matches!(notes.get_author(1), Err(CoreError::NotFound)));
    }
}
