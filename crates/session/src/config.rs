use std::time::Duration;

/// Default debounce window after the last edit before a write-back attempt.
pub const COMMIT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Default gate before re-attempting a retryable write failure.
pub const COMMIT_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Default timeout after which an unacknowledged write is abandoned.
pub const COMMIT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Tuning knobs for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
	/// Trailing-edge debounce window for buffer commits.
	pub debounce: Duration,
	/// Gate before re-attempting a retryable write failure.
	pub retry_delay: Duration,
	/// In-flight write abandonment timeout.
	pub write_timeout: Duration,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			debounce: COMMIT_DEBOUNCE,
			retry_delay: COMMIT_RETRY_DELAY,
			write_timeout: COMMIT_WRITE_TIMEOUT,
		}
	}
}
