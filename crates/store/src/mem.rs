//! In-memory reference implementation of [`NoteCollection`].
//!
//! Mutations are serialized through a service actor; every successful
//! mutation publishes a fresh full snapshot to all subscribers. Intended
//! for tests and embedding, not durability.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, trace};
use uuid::Uuid;

use quill_primitives::{Note, NoteDraft, NoteId, NotePatch};

use crate::{NoteCollection, Snapshot, StoreError};

/// Commands for the store service actor.
#[derive(Debug)]
enum StoreCmd {
	/// Persist a new note.
	Create {
		draft: NoteDraft,
		reply: oneshot::Sender<Result<NoteId, StoreError>>,
	},
	/// Merge a partial update into an existing note.
	WriteMerge {
		id: NoteId,
		patch: NotePatch,
		reply: oneshot::Sender<Result<(), StoreError>>,
	},
	/// Delete a note.
	Remove {
		id: NoteId,
		reply: oneshot::Sender<Result<(), StoreError>>,
	},
}

/// Push-capable in-memory note collection.
///
/// Cloning the handle shares the underlying service. The service stops when
/// every handle has been dropped.
#[derive(Debug, Clone)]
pub struct MemoryCollection {
	tx: mpsc::Sender<StoreCmd>,
	snapshot_rx: watch::Receiver<Snapshot>,
}

impl MemoryCollection {
	/// Starts an empty collection service.
	///
	/// Must be called within a tokio runtime.
	pub fn new() -> Self {
		Self::with_notes(Vec::new())
	}

	/// Starts a collection service pre-seeded with `notes`.
	pub fn with_notes(notes: Vec<Note>) -> Self {
		let (tx, rx) = mpsc::channel(64);
		let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot {
			revision: 0,
			notes: notes.clone().into(),
		});

		let service = StoreService {
			rx,
			notes,
			revision: 0,
			snapshot_tx,
		};
		tokio::spawn(service.run());

		Self { tx, snapshot_rx }
	}

	/// Latest published snapshot.
	pub fn latest(&self) -> Snapshot {
		self.snapshot_rx.borrow().clone()
	}
}

impl Default for MemoryCollection {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl NoteCollection for MemoryCollection {
	fn subscribe(&self) -> watch::Receiver<Snapshot> {
		self.snapshot_rx.clone()
	}

	async fn create(&self, draft: NoteDraft) -> Result<NoteId, StoreError> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(StoreCmd::Create { draft, reply })
			.await
			.map_err(|_| StoreError::Closed)?;
		rx.await.map_err(|_| StoreError::Closed)?
	}

	async fn write_merge(&self, id: &NoteId, patch: NotePatch) -> Result<(), StoreError> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(StoreCmd::WriteMerge {
				id: id.clone(),
				patch,
				reply,
			})
			.await
			.map_err(|_| StoreError::Closed)?;
		rx.await.map_err(|_| StoreError::Closed)?
	}

	async fn remove(&self, id: &NoteId) -> Result<(), StoreError> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(StoreCmd::Remove {
				id: id.clone(),
				reply,
			})
			.await
			.map_err(|_| StoreError::Closed)?;
		rx.await.map_err(|_| StoreError::Closed)?
	}
}

/// Actor state behind [`MemoryCollection`].
struct StoreService {
	rx: mpsc::Receiver<StoreCmd>,
	/// Notes in storage (insertion) order.
	notes: Vec<Note>,
	revision: u64,
	snapshot_tx: watch::Sender<Snapshot>,
}

impl StoreService {
	async fn run(mut self) {
		while let Some(cmd) = self.rx.recv().await {
			match cmd {
				StoreCmd::Create { draft, reply } => {
					let _ = reply.send(Ok(self.handle_create(draft)));
				}
				StoreCmd::WriteMerge { id, patch, reply } => {
					let _ = reply.send(self.handle_write_merge(&id, patch));
				}
				StoreCmd::Remove { id, reply } => {
					let _ = reply.send(self.handle_remove(&id));
				}
			}
		}
		debug!("store.mem.stopped");
	}

	fn handle_create(&mut self, draft: NoteDraft) -> NoteId {
		let id = NoteId::new(Uuid::new_v4().simple().to_string());
		debug!(id = %id, "store.mem.create");
		self.notes.push(Note {
			id: id.clone(),
			body: draft.body,
			created_at: draft.created_at,
			updated_at: draft.updated_at,
		});
		self.publish();
		id
	}

	fn handle_write_merge(&mut self, id: &NoteId, patch: NotePatch) -> Result<(), StoreError> {
		let Some(note) = self.notes.iter_mut().find(|note| &note.id == id) else {
			return Err(StoreError::NotFound(id.clone()));
		};
		trace!(id = %id, "store.mem.write_merge");
		if let Some(body) = patch.body {
			note.body = body;
		}
		if let Some(updated_at) = patch.updated_at {
			note.updated_at = updated_at;
		}
		self.publish();
		Ok(())
	}

	fn handle_remove(&mut self, id: &NoteId) -> Result<(), StoreError> {
		let Some(idx) = self.notes.iter().position(|note| &note.id == id) else {
			return Err(StoreError::NotFound(id.clone()));
		};
		debug!(id = %id, "store.mem.remove");
		self.notes.remove(idx);
		self.publish();
		Ok(())
	}

	fn publish(&mut self) {
		self.revision += 1;
		trace!(
			revision = self.revision,
			len = self.notes.len(),
			"store.mem.publish"
		);
		let _ = self.snapshot_tx.send(Snapshot {
			revision: self.revision,
			notes: self.notes.clone().into(),
		});
	}
}
