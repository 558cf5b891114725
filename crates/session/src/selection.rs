use quill_primitives::{NoteId, first_in_order};

use crate::cache::NoteCache;

/// Tracks which note is current.
///
/// Selection is sticky: cache changes only move it when the tracked id no
/// longer resolves. A just-created id additionally survives snapshots that
/// do not include it yet, so an older push arriving between the create
/// acknowledgment and the push carrying the new note cannot steal the
/// selection.
#[derive(Debug, Default)]
pub struct SelectionManager {
	current: Option<NoteId>,
	/// Id acknowledged by a create that no snapshot has included yet.
	unseen_created: Option<NoteId>,
}

impl SelectionManager {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn current(&self) -> Option<&NoteId> {
		self.current.as_ref()
	}

	/// Explicit user selection. Callers validate the id against the cache.
	pub fn select(&mut self, id: NoteId) {
		self.unseen_created = None;
		self.current = Some(id);
	}

	/// Creation transition: the new note is selected before any snapshot
	/// includes it.
	pub fn select_created(&mut self, id: NoteId) {
		self.unseen_created = Some(id.clone());
		self.current = Some(id);
	}

	/// Re-evaluates the selection against a freshly replaced cache.
	pub fn reconcile(&mut self, cache: &NoteCache) {
		if let Some(id) = &self.current {
			if cache.contains(id) {
				if self.unseen_created.as_ref() == Some(id) {
					self.unseen_created = None;
				}
				return;
			}
			if self.unseen_created.as_ref() == Some(id) {
				// The snapshot carrying the created note has not arrived yet.
				return;
			}
		}
		self.current = first_in_order(cache.notes()).map(|note| note.id.clone());
		self.unseen_created = None;
	}
}
