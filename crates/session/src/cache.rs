use quill_primitives::{Note, NoteId};
use quill_store::Snapshot;

/// Last known full set of remote notes.
///
/// Replaced wholesale on every push, never patched incrementally. The
/// controller loop is the only writer; everything else reads.
#[derive(Debug, Default)]
pub struct NoteCache {
	snapshot: Snapshot,
}

impl NoteCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adopts a snapshot, discarding all previous contents.
	pub fn replace(&mut self, snapshot: Snapshot) {
		self.snapshot = snapshot;
	}

	pub fn notes(&self) -> &[Note] {
		&self.snapshot.notes
	}

	pub fn get(&self, id: &NoteId) -> Option<&Note> {
		self.snapshot.get(id)
	}

	pub fn contains(&self, id: &NoteId) -> bool {
		self.snapshot.get(id).is_some()
	}

	pub fn is_empty(&self) -> bool {
		self.snapshot.is_empty()
	}

	pub fn revision(&self) -> u64 {
		self.snapshot.revision
	}
}
