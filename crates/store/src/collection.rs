use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use quill_primitives::{Note, NoteDraft, NoteId, NotePatch};

use crate::StoreError;

/// Full current set of notes as delivered by a collection push.
///
/// Snapshots are whole-set: a push always carries every note, never a diff.
#[derive(Debug, Clone)]
pub struct Snapshot {
	/// Publish counter, for logging and staleness diagnostics.
	pub revision: u64,
	/// Every note in the collection, in storage order.
	pub notes: Arc<[Note]>,
}

impl Snapshot {
	/// Empty initial snapshot.
	pub fn empty() -> Self {
		Self {
			revision: 0,
			notes: Vec::new().into(),
		}
	}

	/// Looks up a note by id.
	pub fn get(&self, id: &NoteId) -> Option<&Note> {
		self.notes.iter().find(|note| &note.id == id)
	}

	pub fn len(&self) -> usize {
		self.notes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.notes.is_empty()
	}
}

impl Default for Snapshot {
	fn default() -> Self {
		Self::empty()
	}
}

/// Push-capable remote note collection.
///
/// Writes are asynchronous and observed indirectly: a successful mutation
/// is reflected in a later snapshot publish, never by mutating the caller's
/// view in place.
#[async_trait]
pub trait NoteCollection: Send + Sync {
	/// Subscribes to snapshot pushes.
	///
	/// The receiver observes the current snapshot immediately and every
	/// later publish. Dropping the receiver is the unsubscribe; no further
	/// notifications are delivered and no resources are retained for it.
	fn subscribe(&self) -> watch::Receiver<Snapshot>;

	/// Persists a new note and returns its assigned id.
	async fn create(&self, draft: NoteDraft) -> Result<NoteId, StoreError>;

	/// Merges a partial update into an existing note.
	async fn write_merge(&self, id: &NoteId, patch: NotePatch) -> Result<(), StoreError>;

	/// Deletes a note.
	async fn remove(&self, id: &NoteId) -> Result<(), StoreError>;
}
