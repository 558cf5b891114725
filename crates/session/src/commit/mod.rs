//! Debounced write-back scheduling for the edit buffer.
//!
//! [`CommitScheduler`] owns the timing state between user edits and remote
//! writes:
//! - Trailing-edge debounce: every edit pushes the flush deadline out; only
//!   the last text within the window is evaluated.
//! - No-op suppression happens in the controller by comparing the buffer
//!   against the last known remote body before [`CommitScheduler::begin_write`].
//! - Single in-flight write with completion classification and retry gating.
//!
//! # Error Handling
//!
//! - Retryable failures keep the edit dirty and gate the next attempt.
//! - Fatal failures drop the written edit; the controller surfaces them.
//! - In-flight writes stuck past the write timeout are abandoned and retried.

use tokio::time::Instant;

use quill_primitives::NoteId;
use quill_store::StoreError;

use crate::config::SessionConfig;

/// Commit scheduler phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommitPhase {
	/// No uncommitted edits.
	#[default]
	Idle,
	/// Edits pending, waiting for the debounce window to elapse.
	Debouncing,
	/// A write has been issued and not yet acknowledged.
	InFlight,
}

/// Outcome classification for an issued write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteResult {
	/// The write landed.
	Success,
	/// Transient failure; the edit is retried after a gate.
	Retryable,
	/// Non-recoverable failure; the edit is dropped and surfaced.
	Failed,
}

impl WriteResult {
	/// Classify a store error into a write result.
	pub fn from_error(err: &StoreError) -> Self {
		match err {
			StoreError::Backpressure | StoreError::Unavailable(_) => WriteResult::Retryable,
			_ => WriteResult::Failed,
		}
	}
}

/// Metadata about the in-flight write.
#[derive(Debug)]
pub struct InFlightWrite {
	pub id: NoteId,
	/// Comparison basis before this write advanced it; restored on failure
	/// so a reverted buffer is not wrongly suppressed.
	pub prior_base: String,
	pub started_at: Instant,
}

/// Debounced trailing-edge write-back controller.
#[derive(Debug, Default)]
pub struct CommitScheduler {
	phase: CommitPhase,
	/// Buffer holds edits not yet handed to a write.
	dirty: bool,
	last_edit_at: Option<Instant>,
	retry_after: Option<Instant>,
	inflight: Option<InFlightWrite>,
}

impl CommitScheduler {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn phase(&self) -> CommitPhase {
		self.phase
	}

	/// Records a buffer edit, (re)starting the debounce window.
	pub fn note_edit(&mut self, now: Instant) {
		self.dirty = true;
		self.last_edit_at = Some(now);
		if self.phase == CommitPhase::Idle {
			self.phase = CommitPhase::Debouncing;
		}
	}

	/// Whether a flush should be attempted at `now`.
	pub fn is_due(&self, now: Instant, config: &SessionConfig) -> bool {
		if self.phase != CommitPhase::Debouncing || !self.dirty {
			return false;
		}
		if self.retry_after.is_some_and(|gate| now < gate) {
			return false;
		}
		match self.last_edit_at {
			Some(at) => now.duration_since(at) >= config.debounce,
			None => true,
		}
	}

	/// Next instant the controller needs to wake for: the debounce or retry
	/// deadline while edits are pending, the abandonment deadline while a
	/// write is in flight.
	pub fn next_deadline(&self, config: &SessionConfig) -> Option<Instant> {
		match self.phase {
			CommitPhase::Debouncing if self.dirty => {
				let edit = self.last_edit_at.map(|at| at + config.debounce);
				match (edit, self.retry_after) {
					(Some(edit), Some(gate)) => Some(edit.max(gate)),
					(Some(edit), None) => Some(edit),
					(None, gate) => gate,
				}
			}
			CommitPhase::InFlight => self
				.inflight
				.as_ref()
				.map(|write| write.started_at + config.write_timeout),
			_ => None,
		}
	}

	/// Hands the pending edit to a write and transitions in flight.
	pub fn begin_write(&mut self, id: NoteId, prior_base: String, now: Instant) {
		self.dirty = false;
		self.retry_after = None;
		self.phase = CommitPhase::InFlight;
		self.inflight = Some(InFlightWrite {
			id,
			prior_base,
			started_at: now,
		});
	}

	/// The buffer matched the remote body; nothing to persist.
	pub fn skip(&mut self) {
		self.clear_pending();
	}

	/// Selection change or teardown: a pending edit is dropped, never
	/// committed against the new selection. An in-flight write is left to
	/// complete; its outcome no longer affects scheduling.
	pub fn cancel(&mut self) {
		self.clear_pending();
	}

	fn clear_pending(&mut self) {
		self.dirty = false;
		self.last_edit_at = None;
		self.retry_after = None;
		if self.phase == CommitPhase::Debouncing {
			self.phase = CommitPhase::Idle;
		}
	}

	pub fn inflight_id(&self) -> Option<&NoteId> {
		self.inflight.as_ref().map(|write| &write.id)
	}

	pub fn is_inflight_for(&self, id: &NoteId) -> bool {
		self.inflight.as_ref().is_some_and(|write| &write.id == id)
	}

	/// Applies a write completion.
	///
	/// Completions for an id other than the recorded in-flight write (a
	/// write abandoned by the timeout and superseded) are ignored. When the
	/// selection has moved on (`for_current` false) the outcome is only
	/// bookkeeping. Returns the comparison basis to restore on failure.
	pub fn complete(
		&mut self,
		id: &NoteId,
		result: WriteResult,
		for_current: bool,
		now: Instant,
		config: &SessionConfig,
	) -> Option<String> {
		let inflight = match self.inflight.take() {
			Some(write) if &write.id == id => write,
			other => {
				self.inflight = other;
				return None;
			}
		};

		if self.phase == CommitPhase::InFlight {
			self.phase = if self.dirty {
				CommitPhase::Debouncing
			} else {
				CommitPhase::Idle
			};
		}
		if !for_current {
			return None;
		}

		match result {
			WriteResult::Success => {
				self.retry_after = None;
				None
			}
			WriteResult::Retryable => {
				// The edit survives; re-gate the next attempt.
				self.dirty = true;
				self.retry_after = Some(now + config.retry_delay);
				self.phase = CommitPhase::Debouncing;
				Some(inflight.prior_base)
			}
			WriteResult::Failed => {
				// The written edit is dropped; edits made after the write
				// started are still pending.
				self.retry_after = None;
				Some(inflight.prior_base)
			}
		}
	}

	/// Abandons an in-flight write stuck past the timeout.
	///
	/// When the write was for the current selection the edit is re-marked
	/// dirty and gated for retry. Returns the abandoned write.
	pub fn check_write_timeout(
		&mut self,
		now: Instant,
		for_current: bool,
		config: &SessionConfig,
	) -> Option<InFlightWrite> {
		let stuck = self
			.inflight
			.as_ref()
			.is_some_and(|write| now.duration_since(write.started_at) >= config.write_timeout);
		if !stuck {
			return None;
		}
		let write = self.inflight.take()?;
		if for_current {
			self.dirty = true;
			self.retry_after = Some(now + config.retry_delay);
		}
		self.phase = if self.dirty {
			CommitPhase::Debouncing
		} else {
			CommitPhase::Idle
		};
		Some(write)
	}
}
