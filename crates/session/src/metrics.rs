//! Runtime counters for the session core.

use std::sync::atomic::{AtomicU64, Ordering};

/// Session counters for save indicators and diagnostics.
///
/// All counters use relaxed ordering - exact counts are not critical, but
/// trends should be visible.
#[derive(Debug, Default)]
pub struct SessionMetrics {
	/// Snapshots applied to the cache.
	pub snapshots_applied: AtomicU64,
	/// Writes issued by the commit scheduler.
	pub commits_issued: AtomicU64,
	/// Debounce expiries skipped because the buffer matched the remote body.
	pub commits_skipped: AtomicU64,
	/// Failed or abandoned write attempts.
	pub commit_errors: AtomicU64,
	/// Notes created through the session.
	pub notes_created: AtomicU64,
	/// Notes removed through the session.
	pub notes_removed: AtomicU64,
}

impl SessionMetrics {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn inc_snapshots_applied(&self) {
		self.snapshots_applied.fetch_add(1, Ordering::Relaxed);
	}

	pub fn inc_commits_issued(&self) {
		self.commits_issued.fetch_add(1, Ordering::Relaxed);
	}

	pub fn inc_commits_skipped(&self) {
		self.commits_skipped.fetch_add(1, Ordering::Relaxed);
	}

	pub fn inc_commit_errors(&self) {
		self.commit_errors.fetch_add(1, Ordering::Relaxed);
	}

	pub fn inc_notes_created(&self) {
		self.notes_created.fetch_add(1, Ordering::Relaxed);
	}

	pub fn inc_notes_removed(&self) {
		self.notes_removed.fetch_add(1, Ordering::Relaxed);
	}

	pub fn commits_issued(&self) -> u64 {
		self.commits_issued.load(Ordering::Relaxed)
	}

	pub fn commits_skipped(&self) -> u64 {
		self.commits_skipped.load(Ordering::Relaxed)
	}

	pub fn commit_errors(&self) -> u64 {
		self.commit_errors.load(Ordering::Relaxed)
	}

	pub fn snapshots_applied(&self) -> u64 {
		self.snapshots_applied.load(Ordering::Relaxed)
	}

	pub fn notes_created(&self) -> u64 {
		self.notes_created.load(Ordering::Relaxed)
	}

	pub fn notes_removed(&self) -> u64 {
		self.notes_removed.load(Ordering::Relaxed)
	}
}
