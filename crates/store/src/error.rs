use quill_primitives::NoteId;

/// Failures surfaced by a note collection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
	/// The addressed note does not exist.
	#[error("no note with id {0}")]
	NotFound(NoteId),
	/// The store is momentarily unable to accept the operation.
	#[error("store backpressure")]
	Backpressure,
	/// The store is temporarily unreachable.
	#[error("store unavailable: {0}")]
	Unavailable(String),
	/// The store has shut down; no further operations will succeed.
	#[error("store closed")]
	Closed,
}
