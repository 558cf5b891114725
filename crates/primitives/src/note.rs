use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque note identifier, assigned by the store on creation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
	/// Wraps a raw identifier string.
	pub fn new(raw: impl Into<String>) -> Self {
		Self(raw.into())
	}

	/// Returns the identifier as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for NoteId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for NoteId {
	fn from(raw: &str) -> Self {
		Self(raw.to_string())
	}
}

/// Default body for a freshly created note.
pub const PLACEHOLDER_BODY: &str = "# Type your markdown note's title here";

/// A stored note.
///
/// Identity is the id. The body is the only user-mutable field; both
/// timestamps are stamped by the write path, never by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
	pub id: NoteId,
	pub body: String,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Note {
	/// Display title: the first non-empty body line, with leading markdown
	/// heading markers stripped.
	pub fn title(&self) -> &str {
		self.body
			.lines()
			.map(|line| line.trim().trim_start_matches('#').trim())
			.find(|line| !line.is_empty())
			.unwrap_or("Untitled")
	}
}

/// Payload for creating a new note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteDraft {
	pub body: String,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl NoteDraft {
	/// Default new-note document: placeholder body, both timestamps at `now`.
	pub fn placeholder(now: DateTime<Utc>) -> Self {
		Self {
			body: PLACEHOLDER_BODY.to_string(),
			created_at: now,
			updated_at: now,
		}
	}
}

/// Partial update merged into an existing note. Fields left `None` keep
/// their stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotePatch {
	pub body: Option<String>,
	pub updated_at: Option<DateTime<Utc>>,
}

impl NotePatch {
	/// Body rewrite stamped at `now`.
	pub fn body(text: impl Into<String>, now: DateTime<Utc>) -> Self {
		Self {
			body: Some(text.into()),
			updated_at: Some(now),
		}
	}
}
