/// Pending body text for the selected note, decoupled from the cache.
///
/// Seeding happens exactly once per selection change; a cache refresh with
/// unchanged selection never touches the buffer, so uncommitted edits
/// survive remote churn.
#[derive(Debug, Default)]
pub struct EditBuffer {
	text: String,
}

impl EditBuffer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Replaces contents on selection change.
	pub fn seed(&mut self, text: String) {
		self.text = text;
	}

	/// Records a user edit.
	pub fn set(&mut self, text: String) {
		self.text = text;
	}

	/// Current pending text.
	pub fn read(&self) -> &str {
		&self.text
	}
}
