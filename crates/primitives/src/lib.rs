//! Core types for note synchronization: identifiers, records, write payloads,
//! and the presentation ordering policy.

/// Note record, identifier, and write-payload types.
pub mod note;
/// Presentation ordering policy.
pub mod order;

pub use note::{Note, NoteDraft, NoteId, NotePatch, PLACEHOLDER_BODY};
pub use order::{first_in_order, newest_first, sort_for_display};
