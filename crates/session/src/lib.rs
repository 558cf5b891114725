//! Client-side note synchronization core.
//!
//! Reconciles a locally edited note against a push-capable remote collection
//! while shielding the editing surface from write amplification and
//! list-reordering flicker.
//!
//! # Mental model
//!
//! - [`SessionController`] owns all mutable state and runs a single service
//!   loop over intents, snapshot pushes, write completions, and the debounce
//!   deadline. Presentation code holds a [`SessionHandle`] and a watch on
//!   [`SessionView`]; it never touches the state directly.
//! - [`NoteCache`] is replaced wholesale on every snapshot; all writes flow
//!   through the collection and are observed via the next push.
//! - [`SelectionManager`] keeps the current note sticky across unrelated
//!   updates and falls back to the first note in presentation order when the
//!   tracked id goes stale.
//! - [`EditBuffer`] is re-seeded exactly once per selection change; a cache
//!   refresh with unchanged selection never overwrites uncommitted edits.
//! - [`CommitScheduler`](commit::CommitScheduler) debounces buffer edits
//!   (trailing edge), suppresses writes whose text matches the last known
//!   remote body, keeps at most one write in flight, and re-gates failed
//!   writes instead of discarding them.

mod buffer;
mod cache;
pub mod commit;
mod config;
mod controller;
mod metrics;
mod selection;

pub use buffer::EditBuffer;
pub use cache::NoteCache;
pub use commit::{CommitPhase, CommitScheduler, WriteResult};
pub use config::{COMMIT_DEBOUNCE, COMMIT_RETRY_DELAY, COMMIT_WRITE_TIMEOUT, SessionConfig};
pub use controller::{
	SelectError, SessionController, SessionEvent, SessionHandle, SessionView,
};
pub use metrics::SessionMetrics;
pub use selection::SelectionManager;
