//! Presentation ordering: most recently updated first.
//!
//! The order is total: ties on `updated_at` break on the id, so two
//! snapshots with the same contents always present identically.

use std::cmp::Ordering;

use crate::Note;

/// Total presentation order: `updated_at` descending, ties broken by id.
pub fn newest_first(a: &Note, b: &Note) -> Ordering {
	b.updated_at
		.cmp(&a.updated_at)
		.then_with(|| a.id.cmp(&b.id))
}

/// Sorts a list for display. Storage order is never affected; callers sort
/// their own copy.
pub fn sort_for_display(notes: &mut [Note]) {
	notes.sort_by(newest_first);
}

/// The note a stale or unset selection falls back to.
pub fn first_in_order(notes: &[Note]) -> Option<&Note> {
	notes.iter().min_by(|a, b| newest_first(a, b))
}
