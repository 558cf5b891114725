//! Session controller: the single thread of control owning cache, selection,
//! buffer, and commit scheduling.
//!
//! [`SessionController::start`] spawns a service loop in the manner of a
//! service actor: a bounded command channel carries intents from
//! [`SessionHandle`], snapshot pushes arrive on the collection's watch
//! channel, spawned store writes report back on a completion channel, and a
//! deadline arm drives the debounce. All state mutation happens inside the
//! loop; presentation code observes [`SessionView`] through a watch and
//! failures through [`SessionEvent`].
//!
//! Store calls are fire-and-forget: the loop never awaits a write inline, so
//! an unresponsive store can delay persistence but never typing.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

use quill_primitives::{Note, NoteDraft, NoteId, NotePatch, sort_for_display};
use quill_store::{NoteCollection, Snapshot, StoreError};

use crate::buffer::EditBuffer;
use crate::cache::NoteCache;
use crate::commit::{CommitPhase, CommitScheduler, WriteResult};
use crate::config::SessionConfig;
use crate::metrics::SessionMetrics;
use crate::selection::SelectionManager;

/// Rejected selection intents.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectError {
	/// The id does not resolve in the current snapshot.
	#[error("no note with id {0} in the current snapshot")]
	UnknownId(NoteId),
	/// The session loop has stopped.
	#[error("session stopped")]
	Stopped,
}

/// Failures surfaced to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
	/// A buffer commit failed fatally; the edit was dropped.
	CommitFailed { id: NoteId, error: StoreError },
	/// A create intent failed.
	CreateFailed { error: StoreError },
	/// A delete intent failed.
	RemoveFailed { id: NoteId, error: StoreError },
}

/// Read-only presentation state, published after every change.
#[derive(Debug, Clone, Default)]
pub struct SessionView {
	/// Snapshot revision the view was derived from.
	pub revision: u64,
	/// Notes ordered for display, most recently updated first.
	pub notes: Vec<Note>,
	/// Currently selected note id, if any.
	pub current_id: Option<NoteId>,
	/// Resolved current note; absent while a just-created note awaits its
	/// first snapshot.
	pub current: Option<Note>,
	/// Pending body text of the selected note.
	pub buffer: String,
	/// Commit scheduler phase, for save indicators.
	pub phase: CommitPhase,
}

/// Commands accepted by the session loop.
#[derive(Debug)]
enum SessionCmd {
	Select {
		id: NoteId,
		reply: oneshot::Sender<Result<(), SelectError>>,
	},
	SetBuffer {
		text: String,
	},
	CreateNote,
	DeleteNote {
		id: NoteId,
	},
	View {
		reply: oneshot::Sender<SessionView>,
	},
	Shutdown {
		reply: oneshot::Sender<()>,
	},
}

/// Completions from spawned store tasks.
#[derive(Debug)]
enum TaskDone {
	Commit {
		id: NoteId,
		result: WriteResult,
		error: Option<StoreError>,
	},
	Create {
		result: Result<NoteId, StoreError>,
		body: String,
	},
	Remove {
		id: NoteId,
		result: Result<(), StoreError>,
	},
}

/// Cloneable handle for communicating with a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
	tx: mpsc::Sender<SessionCmd>,
	view_rx: watch::Receiver<SessionView>,
	metrics: Arc<SessionMetrics>,
}

impl SessionHandle {
	/// Selects a note. The id must resolve in the current snapshot.
	pub async fn select(&self, id: NoteId) -> Result<(), SelectError> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(SessionCmd::Select { id, reply })
			.await
			.map_err(|_| SelectError::Stopped)?;
		rx.await.map_err(|_| SelectError::Stopped)?
	}

	/// Records the buffer text after a user edit.
	pub async fn set_buffer(&self, text: impl Into<String>) {
		let _ = self
			.tx
			.send(SessionCmd::SetBuffer { text: text.into() })
			.await;
	}

	/// Creates a new note; the created note becomes the selection once the
	/// store acknowledges it.
	pub async fn create_note(&self) {
		let _ = self.tx.send(SessionCmd::CreateNote).await;
	}

	/// Deletes a note. Deliberately never doubles as a select intent.
	pub async fn delete_note(&self, id: NoteId) {
		let _ = self.tx.send(SessionCmd::DeleteNote { id }).await;
	}

	/// Current view, consistent with all intents sent before the call.
	pub async fn view(&self) -> SessionView {
		let (reply, rx) = oneshot::channel();
		if self.tx.send(SessionCmd::View { reply }).await.is_ok() {
			if let Ok(view) = rx.await {
				return view;
			}
		}
		self.view_rx.borrow().clone()
	}

	/// Watch over the published view.
	pub fn subscribe_view(&self) -> watch::Receiver<SessionView> {
		self.view_rx.clone()
	}

	/// Shared session counters.
	pub fn metrics(&self) -> Arc<SessionMetrics> {
		self.metrics.clone()
	}

	/// Stops the session loop. Pending edits are dropped, not committed.
	pub async fn shutdown(&self) {
		let (reply, rx) = oneshot::channel();
		if self.tx.send(SessionCmd::Shutdown { reply }).await.is_ok() {
			let _ = rx.await;
		}
	}
}

/// Service loop owning all session state.
pub struct SessionController {
	store: Arc<dyn NoteCollection>,
	config: SessionConfig,

	cache: NoteCache,
	selection: SelectionManager,
	buffer: EditBuffer,
	scheduler: CommitScheduler,
	/// Last known remote body of the selected note: the commit comparison
	/// basis. Advanced optimistically on write start, restored on failure.
	remote_body: String,

	rx: mpsc::Receiver<SessionCmd>,
	snapshots: watch::Receiver<Snapshot>,
	store_live: bool,
	done_tx: mpsc::UnboundedSender<TaskDone>,
	done_rx: mpsc::UnboundedReceiver<TaskDone>,
	event_tx: mpsc::UnboundedSender<SessionEvent>,
	view_tx: watch::Sender<SessionView>,
	metrics: Arc<SessionMetrics>,
}

impl SessionController {
	/// Spawns the session service over `store`.
	///
	/// Must be called within a tokio runtime. The loop stops on
	/// [`SessionHandle::shutdown`] or when every handle has been dropped.
	pub fn start(
		store: Arc<dyn NoteCollection>,
		config: SessionConfig,
	) -> (SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
		let (tx, rx) = mpsc::channel(64);
		let (done_tx, done_rx) = mpsc::unbounded_channel();
		let (event_tx, event_rx) = mpsc::unbounded_channel();
		let (view_tx, view_rx) = watch::channel(SessionView::default());
		let snapshots = store.subscribe();
		let metrics = Arc::new(SessionMetrics::new());

		let controller = Self {
			store,
			config,
			cache: NoteCache::new(),
			selection: SelectionManager::new(),
			buffer: EditBuffer::new(),
			scheduler: CommitScheduler::new(),
			remote_body: String::new(),
			rx,
			snapshots,
			store_live: true,
			done_tx,
			done_rx,
			event_tx,
			view_tx,
			metrics: metrics.clone(),
		};
		tokio::spawn(controller.run());

		(
			SessionHandle {
				tx,
				view_rx,
				metrics,
			},
			event_rx,
		)
	}

	async fn run(mut self) {
		// Adopt whatever the collection currently holds before serving
		// intents; the watch always carries an initial snapshot.
		self.apply_snapshot();
		self.publish_view();
		debug!("session.started");

		loop {
			let deadline = self.scheduler.next_deadline(&self.config);
			let wake = deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(60));

			tokio::select! {
				cmd = self.rx.recv() => {
					let Some(cmd) = cmd else { break };
					if self.handle_cmd(cmd) {
						break;
					}
				}
				changed = self.snapshots.changed(), if self.store_live => {
					match changed {
						Ok(()) => self.apply_snapshot(),
						Err(_) => {
							debug!("session.snapshot.source_closed");
							self.store_live = false;
						}
					}
				}
				Some(done) = self.done_rx.recv() => self.handle_done(done),
				_ = time::sleep_until(wake), if deadline.is_some() => {
					self.on_deadline(Instant::now());
				}
			}

			self.publish_view();
		}

		// Teardown never commits a pending edit.
		self.scheduler.cancel();
		debug!("session.stopped");
	}

	/// Returns true when the loop should stop.
	fn handle_cmd(&mut self, cmd: SessionCmd) -> bool {
		match cmd {
			SessionCmd::Select { id, reply } => {
				let _ = reply.send(self.handle_select(id));
			}
			SessionCmd::SetBuffer { text } => self.handle_set_buffer(text),
			SessionCmd::CreateNote => self.handle_create(),
			SessionCmd::DeleteNote { id } => self.handle_delete(id),
			SessionCmd::View { reply } => {
				let _ = reply.send(self.current_view());
			}
			SessionCmd::Shutdown { reply } => {
				let _ = reply.send(());
				return true;
			}
		}
		false
	}

	fn handle_select(&mut self, id: NoteId) -> Result<(), SelectError> {
		if !self.cache.contains(&id) {
			warn!(id = %id, "session.select.unknown_id");
			return Err(SelectError::UnknownId(id));
		}
		trace!(id = %id, "session.select");
		let prev = self.selection.current().cloned();
		self.selection.select(id);
		self.after_selection_change(prev.as_ref());
		Ok(())
	}

	fn handle_set_buffer(&mut self, text: String) {
		if self.selection.current().is_none() {
			trace!("session.edit.no_selection");
			return;
		}
		self.buffer.set(text);
		self.scheduler.note_edit(Instant::now());
	}

	fn handle_create(&mut self) {
		let draft = NoteDraft::placeholder(Utc::now());
		debug!("session.create.start");
		let store = self.store.clone();
		let done = self.done_tx.clone();
		tokio::spawn(async move {
			let body = draft.body.clone();
			let result = store.create(draft).await;
			if let Err(err) = &result {
				warn!(error = %err, "session.create.failed");
			}
			let _ = done.send(TaskDone::Create { result, body });
		});
	}

	fn handle_delete(&mut self, id: NoteId) {
		// Deliberately no selection handling here: the delete intent must
		// never be reinterpreted as a select intent. Selection catches up
		// through the next snapshot.
		debug!(id = %id, "session.remove.start");
		let store = self.store.clone();
		let done = self.done_tx.clone();
		tokio::spawn(async move {
			let result = store.remove(&id).await;
			if let Err(err) = &result {
				warn!(id = %id, error = %err, "session.remove.failed");
			}
			let _ = done.send(TaskDone::Remove { id, result });
		});
	}

	fn apply_snapshot(&mut self) {
		let snapshot = self.snapshots.borrow_and_update().clone();
		debug!(
			revision = snapshot.revision,
			len = snapshot.len(),
			"session.snapshot.apply"
		);
		self.cache.replace(snapshot);
		self.metrics.inc_snapshots_applied();

		let prev = self.selection.current().cloned();
		self.selection.reconcile(&self.cache);
		if self.selection.current() != prev.as_ref() {
			self.after_selection_change(prev.as_ref());
		} else if let Some(note) = self.selection.current().and_then(|id| self.cache.get(id)) {
			// Unchanged selection: refresh the commit comparison basis only.
			// The buffer keeps any uncommitted edits, and an in-flight write
			// remains the freshest knowledge of the remote body.
			if !self.scheduler.is_inflight_for(&note.id) {
				self.remote_body = note.body.clone();
			}
		}
	}

	/// Runs the selection-change edge: cancels any pending commit and
	/// re-seeds the buffer. Re-seeding happens here and nowhere else.
	fn after_selection_change(&mut self, prev: Option<&NoteId>) {
		if self.selection.current() == prev {
			return;
		}
		// A pending edit for the previous note must never be committed
		// under the new selection.
		self.scheduler.cancel();
		let seed = self
			.selection
			.current()
			.and_then(|id| self.cache.get(id))
			.map(|note| note.body.clone())
			.unwrap_or_default();
		debug!(
			prev = ?prev,
			current = ?self.selection.current(),
			"session.selection.changed"
		);
		self.buffer.seed(seed.clone());
		self.remote_body = seed;
	}

	fn on_deadline(&mut self, now: Instant) {
		let inflight_current = match (self.scheduler.inflight_id(), self.selection.current()) {
			(Some(inflight), Some(current)) => inflight == current,
			_ => false,
		};
		if let Some(abandoned) =
			self.scheduler
				.check_write_timeout(now, inflight_current, &self.config)
		{
			warn!(id = %abandoned.id, "session.commit.write_timeout");
			self.metrics.inc_commit_errors();
			if inflight_current {
				self.remote_body = abandoned.prior_base;
			}
		}
		if self.scheduler.is_due(now, &self.config) {
			self.flush(now);
		}
	}

	/// Evaluates the debounced buffer against the remote body and issues a
	/// merge write when they differ.
	fn flush(&mut self, now: Instant) {
		let Some(id) = self.selection.current().cloned() else {
			// A dirty buffer with no selection has nothing to commit against.
			self.scheduler.cancel();
			return;
		};
		let text = self.buffer.read().to_string();
		if text == self.remote_body {
			// Re-displaying an unchanged note must not touch updated_at and
			// with it the list order.
			trace!(id = %id, "session.commit.skip_clean");
			self.metrics.inc_commits_skipped();
			self.scheduler.skip();
			return;
		}

		let prior_base = std::mem::replace(&mut self.remote_body, text.clone());
		self.scheduler.begin_write(id.clone(), prior_base, now);
		self.metrics.inc_commits_issued();
		debug!(id = %id, bytes = text.len(), "session.commit.flush_start");

		let store = self.store.clone();
		let done = self.done_tx.clone();
		let patch = NotePatch::body(text, Utc::now());
		tokio::spawn(async move {
			let started = Instant::now();
			let result = store.write_merge(&id, patch).await;
			let latency_ms = started.elapsed().as_millis() as u64;
			let (write, error) = match result {
				Ok(()) => {
					debug!(id = %id, latency_ms, "session.commit.flush_done");
					(WriteResult::Success, None)
				}
				Err(err) => {
					let classified = WriteResult::from_error(&err);
					warn!(id = %id, latency_ms, error = %err, ?classified, "session.commit.flush_failed");
					(classified, Some(err))
				}
			};
			let _ = done.send(TaskDone::Commit {
				id,
				result: write,
				error,
			});
		});
	}

	fn handle_done(&mut self, done: TaskDone) {
		match done {
			TaskDone::Commit { id, result, error } => {
				let for_current = self.selection.current() == Some(&id);
				let restored = self.scheduler.complete(
					&id,
					result,
					for_current,
					Instant::now(),
					&self.config,
				);
				if for_current {
					if let Some(prior) = restored {
						self.remote_body = prior;
					}
				}
				match result {
					WriteResult::Success => {}
					WriteResult::Retryable => self.metrics.inc_commit_errors(),
					WriteResult::Failed => {
						self.metrics.inc_commit_errors();
						if let Some(error) = error {
							let _ = self.event_tx.send(SessionEvent::CommitFailed { id, error });
						}
					}
				}
			}
			TaskDone::Create { result, body } => match result {
				Ok(id) => {
					debug!(id = %id, "session.create.acked");
					self.metrics.inc_notes_created();
					let prev = self.selection.current().cloned();
					self.selection.select_created(id.clone());
					if prev.as_ref() != Some(&id) {
						// Creation implies selection. The cache learns about
						// the note from the next snapshot; until then the
						// draft body is the known remote state.
						self.scheduler.cancel();
						self.buffer.seed(body.clone());
						self.remote_body = body;
					}
				}
				Err(error) => {
					let _ = self.event_tx.send(SessionEvent::CreateFailed { error });
				}
			},
			TaskDone::Remove { id, result } => match result {
				Ok(()) => self.metrics.inc_notes_removed(),
				Err(error) => {
					let _ = self.event_tx.send(SessionEvent::RemoveFailed { id, error });
				}
			},
		}
	}

	fn current_view(&self) -> SessionView {
		let mut notes = self.cache.notes().to_vec();
		sort_for_display(&mut notes);
		let current_id = self.selection.current().cloned();
		let current = current_id
			.as_ref()
			.and_then(|id| self.cache.get(id))
			.cloned();
		SessionView {
			revision: self.cache.revision(),
			notes,
			current_id,
			current,
			buffer: self.buffer.read().to_string(),
			phase: self.scheduler.phase(),
		}
	}

	fn publish_view(&self) {
		let _ = self.view_tx.send(self.current_view());
	}
}
