//! Shutdown: close admission, cancel everything outstanding, drain with a bound.

use std::sync::Arc;
use std::time::Instant;

use crate::manager::RequestManager;
use crate::slot::ExecutionSlot;

/// Outcome of a [`RequestManager`] shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
	completed: bool,
	abandoned: usize,
}

impl ShutdownReport {
	/// Every outstanding slot vacated within the drain timeout.
	pub fn completed(&self) -> bool {
		self.completed
	}

	pub fn timed_out(&self) -> bool {
		!self.completed
	}

	/// Slots still occupied when the drain timeout expired. Their callbacks
	/// ignored cancellation and keep running detached.
	pub fn abandoned(&self) -> usize {
		self.abandoned
	}
}

impl RequestManager {
	/// Stops admission, cancels every outstanding request and waits up to the
	/// configured timeout for their slots to vacate.
	///
	/// Every outstanding future is settled before this returns; submissions
	/// made afterwards fail with `ShutdownRejected`. Calling it again is harmless.
	pub async fn shutdown(&self) -> ShutdownReport {
		let slots = self.begin_shutdown();
		let timeout = self.inner.config.shutdown_timeout_duration();
		let drain = async {
			for slot in &slots {
				slot.vacated().opened().await;
			}
		};
		let _ = tokio::time::timeout(timeout, drain).await;
		self.finish_shutdown(&slots)
	}

	/// Blocking variant of [`shutdown`](Self::shutdown) for callers outside an
	/// async context.
	pub fn shutdown_blocking(&self) -> ShutdownReport {
		let slots = self.begin_shutdown();
		let deadline = Instant::now() + self.inner.config.shutdown_timeout_duration();
		for slot in &slots {
			if !slot.vacated().wait_until(deadline) {
				break;
			}
		}
		self.finish_shutdown(&slots)
	}

	fn begin_shutdown(&self) -> Vec<Arc<ExecutionSlot>> {
		let slots = self.inner.admission.lock().close();
		if let Some(permits) = &self.inner.dispatcher.read_permits {
			permits.close();
		}
		tracing::info!(outstanding = slots.len(), "requests.shutdown");
		for slot in &slots {
			slot.cancel();
		}
		slots
	}

	fn finish_shutdown(&self, slots: &[Arc<ExecutionSlot>]) -> ShutdownReport {
		let abandoned = slots.iter().filter(|slot| !slot.is_vacated()).count();
		if abandoned > 0 {
			tracing::warn!(
				abandoned,
				timeout_ms = self.inner.config.shutdown_timeout_ms,
				"requests.shutdown.timeout: callbacks ignored cancellation"
			);
		} else {
			tracing::debug!(drained = slots.len(), "requests.shutdown.complete");
		}
		ShutdownReport {
			completed: abandoned == 0,
			abandoned,
		}
	}
}
