//! End-to-end session behavior over collection doubles and the in-memory
//! store: debounce coalescing, no-op suppression, selection stickiness,
//! creation/deletion intents, and failure recovery.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::watch;
use tokio::time::{advance, sleep, timeout};

use quill_primitives::{Note, NoteDraft, NoteId, NotePatch, PLACEHOLDER_BODY};
use quill_session::{
	CommitPhase, SelectError, SessionConfig, SessionController, SessionEvent, SessionHandle,
	SessionView,
};
use quill_store::{MemoryCollection, NoteCollection, Snapshot, StoreError};

fn note(id: &str, body: &str, updated_at: i64) -> Note {
	Note {
		id: NoteId::from(id),
		body: body.to_string(),
		created_at: Utc.timestamp_opt(0, 0).unwrap(),
		updated_at: Utc.timestamp_opt(updated_at, 0).unwrap(),
	}
}

async fn wait_until<F>(name: &str, mut condition: F)
where
	F: FnMut() -> bool,
{
	timeout(Duration::from_secs(5), async move {
		loop {
			if condition() {
				return;
			}
			sleep(Duration::from_millis(10)).await;
		}
	})
	.await
	.unwrap_or_else(|_| panic!("timed out waiting for {name}"));
}

fn view_of(rx: &watch::Receiver<SessionView>) -> SessionView {
	rx.borrow().clone()
}

/// Collection double that records every operation and can fail injected
/// writes.
struct RecordingCollection {
	snapshot_tx: watch::Sender<Snapshot>,
	revision: AtomicU32,
	next_id: AtomicU32,
	writes: Mutex<Vec<(NoteId, NotePatch)>>,
	write_attempts: AtomicU32,
	fail_writes: Mutex<VecDeque<StoreError>>,
	creates: Mutex<Vec<NoteDraft>>,
	removes: Mutex<Vec<NoteId>>,
}

impl RecordingCollection {
	fn new(notes: Vec<Note>) -> Arc<Self> {
		let (snapshot_tx, _) = watch::channel(Snapshot {
			revision: 1,
			notes: notes.into(),
		});
		Arc::new(Self {
			snapshot_tx,
			revision: AtomicU32::new(1),
			next_id: AtomicU32::new(1),
			writes: Mutex::new(Vec::new()),
			write_attempts: AtomicU32::new(0),
			fail_writes: Mutex::new(VecDeque::new()),
			creates: Mutex::new(Vec::new()),
			removes: Mutex::new(Vec::new()),
		})
	}

	/// Publishes a fresh snapshot, as a remote push would.
	fn push(&self, notes: Vec<Note>) {
		let revision = u64::from(self.revision.fetch_add(1, Ordering::Relaxed)) + 1;
		let _ = self.snapshot_tx.send(Snapshot {
			revision,
			notes: notes.into(),
		});
	}

	fn fail_next_write(&self, error: StoreError) {
		self.fail_writes.lock().unwrap().push_back(error);
	}

	fn writes(&self) -> Vec<(NoteId, NotePatch)> {
		self.writes.lock().unwrap().clone()
	}

	fn write_attempts(&self) -> u32 {
		self.write_attempts.load(Ordering::Relaxed)
	}

	fn creates(&self) -> Vec<NoteDraft> {
		self.creates.lock().unwrap().clone()
	}

	fn removes(&self) -> Vec<NoteId> {
		self.removes.lock().unwrap().clone()
	}
}

#[async_trait]
impl NoteCollection for RecordingCollection {
	fn subscribe(&self) -> watch::Receiver<Snapshot> {
		self.snapshot_tx.subscribe()
	}

	async fn create(&self, draft: NoteDraft) -> Result<NoteId, StoreError> {
		let n = self.next_id.fetch_add(1, Ordering::Relaxed);
		self.creates.lock().unwrap().push(draft);
		Ok(NoteId::new(format!("note-{n}")))
	}

	async fn write_merge(&self, id: &NoteId, patch: NotePatch) -> Result<(), StoreError> {
		self.write_attempts.fetch_add(1, Ordering::Relaxed);
		if let Some(error) = self.fail_writes.lock().unwrap().pop_front() {
			return Err(error);
		}
		self.writes.lock().unwrap().push((id.clone(), patch));
		Ok(())
	}

	async fn remove(&self, id: &NoteId) -> Result<(), StoreError> {
		self.removes.lock().unwrap().push(id.clone());
		Ok(())
	}
}

fn start(
	store: &Arc<RecordingCollection>,
) -> (
	SessionHandle,
	tokio::sync::mpsc::UnboundedReceiver<SessionEvent>,
) {
	SessionController::start(store.clone(), SessionConfig::default())
}

#[tokio::test(start_paused = true)]
async fn initial_snapshot_selects_the_newest_note() {
	let store = RecordingCollection::new(vec![note("a", "alpha", 5), note("b", "beta", 10)]);
	let (session, _events) = start(&store);
	let view_rx = session.subscribe_view();

	wait_until("initial view", || view_of(&view_rx).current_id.is_some()).await;

	let view = session.view().await;
	assert_eq!(view.current_id, Some(NoteId::from("b")));
	assert_eq!(view.buffer, "beta");
	let ids: Vec<_> = view.notes.iter().map(|n| n.id.as_str().to_string()).collect();
	assert_eq!(ids, ["b", "a"]);
	assert_eq!(view.phase, CommitPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn rapid_edits_coalesce_into_one_write() {
	let store = RecordingCollection::new(vec![note("a", "alpha", 10)]);
	let (session, _events) = start(&store);
	let view_rx = session.subscribe_view();
	wait_until("initial view", || view_of(&view_rx).current_id.is_some()).await;

	session.set_buffer("d").await;
	wait_until("first edit", || view_of(&view_rx).buffer == "d").await;
	session.set_buffer("dr").await;
	wait_until("second edit", || view_of(&view_rx).buffer == "dr").await;
	session.set_buffer("draft").await;

	wait_until("debounced write", || store.writes().len() == 1).await;

	// Settle well past further deadlines: no second write may appear.
	advance(Duration::from_secs(2)).await;
	sleep(Duration::from_millis(50)).await;

	let writes = store.writes();
	assert_eq!(writes.len(), 1);
	let (id, patch) = &writes[0];
	assert_eq!(id, &NoteId::from("a"));
	assert_eq!(patch.body.as_deref(), Some("draft"));
	assert!(patch.updated_at.is_some());
	assert_eq!(session.metrics().commits_issued(), 1);
}

#[tokio::test(start_paused = true)]
async fn unchanged_buffer_issues_no_write() {
	let store = RecordingCollection::new(vec![note("a", "alpha", 10)]);
	let (session, _events) = start(&store);
	let view_rx = session.subscribe_view();
	wait_until("initial view", || view_of(&view_rx).current_id.is_some()).await;

	// Re-assert the text the note already has, as re-rendering an editor
	// surface does.
	session.set_buffer("alpha").await;
	wait_until("debounce armed", || {
		view_of(&view_rx).phase == CommitPhase::Debouncing
	})
	.await;

	wait_until("skip counted", || session.metrics().commits_skipped() == 1).await;

	assert!(store.writes().is_empty());
	assert_eq!(store.write_attempts(), 0);
	assert_eq!(view_of(&view_rx).phase, CommitPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn unrelated_snapshot_keeps_selection_and_buffer() {
	let store = RecordingCollection::new(vec![note("a", "alpha", 5), note("b", "beta", 10)]);
	let (session, _events) = start(&store);
	let view_rx = session.subscribe_view();
	wait_until("initial view", || view_of(&view_rx).current_id.is_some()).await;

	session.set_buffer("draft text").await;
	wait_until("edit applied", || view_of(&view_rx).buffer == "draft text").await;

	// A push arrives with the selected note unchanged and a brand-new note
	// that now sorts first.
	store.push(vec![
		note("a", "alpha", 5),
		note("b", "beta", 10),
		note("c", "fresh", 50),
	]);
	wait_until("snapshot applied", || view_of(&view_rx).notes.len() == 3).await;

	let view = session.view().await;
	assert_eq!(view.current_id, Some(NoteId::from("b")));
	assert_eq!(view.buffer, "draft text");

	// The pending edit still commits to the selected note.
	wait_until("write recorded", || store.writes().len() == 1).await;
	assert_eq!(store.writes()[0].0, NoteId::from("b"));
}

#[tokio::test(start_paused = true)]
async fn select_seeds_the_buffer_and_rejects_unknown_ids() {
	let store = RecordingCollection::new(vec![note("a", "alpha", 5), note("b", "beta", 10)]);
	let (session, _events) = start(&store);
	let view_rx = session.subscribe_view();
	wait_until("initial view", || view_of(&view_rx).current_id.is_some()).await;

	session.select(NoteId::from("a")).await.unwrap();
	wait_until("selection moved", || {
		view_of(&view_rx).current_id == Some(NoteId::from("a"))
	})
	.await;
	assert_eq!(view_of(&view_rx).buffer, "alpha");

	let err = session.select(NoteId::from("ghost")).await.unwrap_err();
	assert_eq!(err, SelectError::UnknownId(NoteId::from("ghost")));
	assert_eq!(view_of(&view_rx).current_id, Some(NoteId::from("a")));
}

#[tokio::test(start_paused = true)]
async fn creation_selects_the_new_note() {
	let store = RecordingCollection::new(vec![note("a", "alpha", 50)]);
	let (session, _events) = start(&store);
	let view_rx = session.subscribe_view();
	wait_until("initial view", || view_of(&view_rx).current_id.is_some()).await;

	session.create_note().await;
	wait_until("created note selected", || {
		view_of(&view_rx).current_id == Some(NoteId::from("note-1"))
	})
	.await;

	let creates = store.creates();
	assert_eq!(creates.len(), 1);
	assert_eq!(creates[0].body, PLACEHOLDER_BODY);
	assert_eq!(view_of(&view_rx).buffer, PLACEHOLDER_BODY);
	assert_eq!(view_of(&view_rx).current, None);

	// An older push without the new note must not steal the selection.
	store.push(vec![note("a", "alpha", 50)]);
	wait_until("stale snapshot applied", || view_of(&view_rx).revision == 2).await;
	assert_eq!(view_of(&view_rx).current_id, Some(NoteId::from("note-1")));

	// The push carrying the note resolves it, even though it sorts last.
	store.push(vec![
		note("a", "alpha", 50),
		note("note-1", PLACEHOLDER_BODY, 1),
	]);
	wait_until("created note resolved", || {
		view_of(&view_rx).current.is_some()
	})
	.await;
	let view = session.view().await;
	assert_eq!(view.current_id, Some(NoteId::from("note-1")));
	assert_eq!(view.notes.last().map(|n| n.id.as_str()), Some("note-1"));
}

#[tokio::test(start_paused = true)]
async fn switching_selection_cancels_the_pending_commit() {
	let store = RecordingCollection::new(vec![note("a", "alpha", 10), note("b", "beta", 5)]);
	let (session, _events) = start(&store);
	let view_rx = session.subscribe_view();
	wait_until("initial view", || {
		view_of(&view_rx).current_id == Some(NoteId::from("a"))
	})
	.await;

	session.set_buffer("uncommitted").await;
	wait_until("edit applied", || view_of(&view_rx).buffer == "uncommitted").await;

	session.select(NoteId::from("b")).await.unwrap();

	advance(Duration::from_secs(2)).await;
	sleep(Duration::from_millis(50)).await;

	// The stale buffer was never written - neither to the old id nor,
	// worse, to the new one.
	assert!(store.writes().is_empty());
	assert_eq!(store.write_attempts(), 0);
	let view = session.view().await;
	assert_eq!(view.current_id, Some(NoteId::from("b")));
	assert_eq!(view.buffer, "beta");
}

#[tokio::test(start_paused = true)]
async fn retryable_write_failure_keeps_the_edit_and_retries() {
	let store = RecordingCollection::new(vec![note("a", "alpha", 10)]);
	let (session, _events) = start(&store);
	let view_rx = session.subscribe_view();
	wait_until("initial view", || view_of(&view_rx).current_id.is_some()).await;

	store.fail_next_write(StoreError::Unavailable("injected".to_string()));
	session.set_buffer("draft").await;

	wait_until("first attempt failed", || store.write_attempts() == 1).await;
	assert!(store.writes().is_empty());

	// The retry gate passes and the same text lands.
	wait_until("retry landed", || store.writes().len() == 1).await;
	assert_eq!(store.writes()[0].1.body.as_deref(), Some("draft"));
	assert_eq!(store.write_attempts(), 2);
	assert_eq!(session.metrics().commit_errors(), 1);
	assert_eq!(session.metrics().commits_issued(), 2);
}

#[tokio::test(start_paused = true)]
async fn fatal_write_failure_surfaces_and_drops_the_edit() {
	let store = RecordingCollection::new(vec![note("a", "alpha", 10)]);
	let (session, mut events) = start(&store);
	let view_rx = session.subscribe_view();
	wait_until("initial view", || view_of(&view_rx).current_id.is_some()).await;

	store.fail_next_write(StoreError::NotFound(NoteId::from("a")));
	session.set_buffer("doomed").await;

	let event = timeout(Duration::from_secs(5), events.recv())
		.await
		.expect("commit failure surfaced")
		.expect("event channel open");
	assert_eq!(
		event,
		SessionEvent::CommitFailed {
			id: NoteId::from("a"),
			error: StoreError::NotFound(NoteId::from("a")),
		}
	);

	// The edit is dropped, not retried.
	advance(Duration::from_secs(2)).await;
	sleep(Duration::from_millis(50)).await;
	assert_eq!(store.write_attempts(), 1);
	assert!(store.writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_the_pending_commit() {
	let store = RecordingCollection::new(vec![note("a", "alpha", 10)]);
	let (session, _events) = start(&store);
	let view_rx = session.subscribe_view();
	wait_until("initial view", || view_of(&view_rx).current_id.is_some()).await;

	session.set_buffer("never persisted").await;
	wait_until("edit applied", || {
		view_of(&view_rx).buffer == "never persisted"
	})
	.await;

	session.shutdown().await;

	advance(Duration::from_secs(2)).await;
	sleep(Duration::from_millis(50)).await;
	assert_eq!(store.write_attempts(), 0);

	let err = session.select(NoteId::from("a")).await.unwrap_err();
	assert_eq!(err, SelectError::Stopped);
}

#[tokio::test(start_paused = true)]
async fn delete_intent_never_moves_the_selection_by_itself() {
	let store = RecordingCollection::new(vec![note("a", "alpha", 10), note("b", "beta", 5)]);
	let (session, _events) = start(&store);
	let view_rx = session.subscribe_view();
	wait_until("initial view", || {
		view_of(&view_rx).current_id == Some(NoteId::from("a"))
	})
	.await;

	// Deleting a note from the list, selected or not, is not a select.
	session.delete_note(NoteId::from("b")).await;
	wait_until("remove issued", || store.removes() == vec![NoteId::from("b")]).await;
	assert_eq!(view_of(&view_rx).current_id, Some(NoteId::from("a")));

	session.delete_note(NoteId::from("a")).await;
	wait_until("remove issued", || store.removes().len() == 2).await;
	assert_eq!(view_of(&view_rx).current_id, Some(NoteId::from("a")));

	// Only the resulting push reassigns the selection.
	store.push(vec![note("b", "beta", 5)]);
	wait_until("fallback applied", || {
		view_of(&view_rx).current_id == Some(NoteId::from("b"))
	})
	.await;
	assert_eq!(view_of(&view_rx).buffer, "beta");
}

#[tokio::test(start_paused = true)]
async fn full_loop_against_the_memory_store() {
	let store = Arc::new(MemoryCollection::new());
	let (session, _events) =
		SessionController::start(store.clone(), SessionConfig::default());
	let view_rx = session.subscribe_view();

	// Empty store: nothing selected, presentation handles the empty case.
	wait_until("initial view", || view_of(&view_rx).revision == 0).await;
	assert_eq!(view_of(&view_rx).current_id, None);

	session.create_note().await;
	wait_until("created and resolved", || {
		view_of(&view_rx).current.is_some()
	})
	.await;
	let first_id = view_of(&view_rx).current_id.expect("created note selected");
	assert_eq!(view_of(&view_rx).buffer, PLACEHOLDER_BODY);

	session.set_buffer("# Groceries\nmilk").await;
	wait_until("autosave landed", || {
		store
			.latest()
			.get(&first_id)
			.is_some_and(|n| n.body == "# Groceries\nmilk")
	})
	.await;
	let saved = store.latest().get(&first_id).expect("note present").clone();
	assert!(saved.updated_at >= saved.created_at);
	assert_eq!(saved.title(), "Groceries");
	assert_eq!(session.metrics().commits_issued(), 1);

	session.create_note().await;
	wait_until("second note selected", || {
		view_of(&view_rx)
			.current_id
			.as_ref()
			.is_some_and(|id| id != &first_id)
	})
	.await;
	let second_id = view_of(&view_rx).current_id.expect("second note selected");
	wait_until("both notes visible", || view_of(&view_rx).notes.len() == 2).await;

	session.delete_note(second_id).await;
	wait_until("deletion reflected", || view_of(&view_rx).notes.len() == 1).await;

	// Selection falls back to the surviving note; its body seeds the buffer.
	wait_until("fallback selection", || {
		view_of(&view_rx).current_id.as_ref() == Some(&first_id)
	})
	.await;
	assert_eq!(view_of(&view_rx).buffer, "# Groceries\nmilk");
}
