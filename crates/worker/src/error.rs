use thiserror::Error;

/// Terminal failure of a submitted request.
///
/// `Cancelled` is always distinct from `Failed`: a request whose cancellation
/// was requested settles as `Cancelled` no matter what its callback returned.
#[derive(Debug, Error)]
pub enum RequestError<E> {
	/// The callback returned an error. Forwarded verbatim.
	#[error("request callback failed: {0}")]
	Failed(E),
	/// Cancellation was requested before an outcome was published.
	#[error("request cancelled")]
	Cancelled,
	/// The callback panicked.
	#[error("request callback panicked: {0}")]
	Panicked(String),
	/// The request was submitted after shutdown.
	#[error("request manager is shut down")]
	ShutdownRejected,
}

impl<E> RequestError<E> {
	pub fn is_cancelled(&self) -> bool {
		matches!(self, Self::Cancelled)
	}

	pub fn is_shutdown(&self) -> bool {
		matches!(self, Self::ShutdownRejected)
	}

	/// Returns the callback error, if this is a callback failure.
	pub fn into_failure(self) -> Option<E> {
		match self {
			Self::Failed(err) => Some(err),
			_ => None,
		}
	}
}
