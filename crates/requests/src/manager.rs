//! Request manager: admission, sequencing and cooperative cancellation.
//!
//! # Ordering
//!
//! * Reads admitted with no write outstanding run immediately and concurrently.
//! * A read admitted while a write is outstanding runs once that write's slot
//!   has vacated.
//! * A write requests cancellation of every earlier read still outstanding and
//!   of the write it supersedes, then runs once those earlier reads have vacated.
//!
//! # Superseded writes
//!
//! A write does not wait for the write it supersedes: it only requests that
//! write's cancellation. A write callback that ignores its [`CancelIndicator`]
//! keeps running and may still mutate shared state while its successor
//! executes. Its return value is discarded. Write callbacks must poll the
//! indicator at bounded intervals.

use std::sync::Arc;

use arbiter_worker::{CancelIndicator, RequestError, RequestFuture, request_pair, runtime_handle};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;

use crate::admission::{Admission, ManagerSnapshot, ReadPlan};
use crate::config::{ConfigError, ManagerConfig};
use crate::slot::{Dispatcher, ExecutionSlot, Gate, RequestKind, request_job};

pub(crate) struct ManagerInner {
	pub(crate) config: ManagerConfig,
	pub(crate) admission: Mutex<Admission>,
	pub(crate) dispatcher: Dispatcher,
}

/// Schedules read and write requests against shared state.
///
/// Cloning yields another handle to the same manager.
#[derive(Clone)]
pub struct RequestManager {
	pub(crate) inner: Arc<ManagerInner>,
}

impl Default for RequestManager {
	fn default() -> Self {
		Self::build(ManagerConfig::default(), runtime_handle())
	}
}

impl RequestManager {
	/// Creates a manager on the current tokio runtime, or the global worker
	/// runtime when called outside one.
	///
	/// # Errors
	///
	/// Returns [`ConfigError::Invalid`] if `config` fails validation.
	pub fn new(config: ManagerConfig) -> Result<Self, ConfigError> {
		Self::with_handle(config, runtime_handle())
	}

	/// Creates a manager whose slots run on `handle`.
	///
	/// # Errors
	///
	/// Returns [`ConfigError::Invalid`] if `config` fails validation.
	pub fn with_handle(config: ManagerConfig, handle: Handle) -> Result<Self, ConfigError> {
		config.validate()?;
		Ok(Self::build(config, handle))
	}

	fn build(config: ManagerConfig, handle: Handle) -> Self {
		let read_permits = config.max_concurrent_reads.map(|limit| Arc::new(Semaphore::new(limit)));
		Self {
			inner: Arc::new(ManagerInner {
				config,
				admission: Mutex::new(Admission::default()),
				dispatcher: Dispatcher { handle, read_permits },
			}),
		}
	}

	pub fn config(&self) -> &ManagerConfig {
		&self.inner.config
	}

	/// Submits a non-mutating request.
	///
	/// The callback may run concurrently with other reads and must not mutate
	/// shared state. It never runs concurrently with a write admitted before it.
	pub fn submit_read<T, E, F>(&self, callback: F) -> RequestFuture<T, E>
	where
		F: FnOnce(&CancelIndicator) -> Result<T, E> + Send + 'static,
		T: Send + 'static,
		E: Send + 'static,
	{
		let (settler, future) = request_pair(CancelIndicator::new());
		let mut admission = self.inner.admission.lock();
		if admission.is_closed() {
			admission.record_rejection();
			drop(admission);
			tracing::debug!(kind = "read", "requests.submit.rejected");
			settler.fail(RequestError::ShutdownRejected);
			return future;
		}

		let job = request_job(RequestKind::Read, settler.clone(), callback);
		let slot = ExecutionSlot::new(admission.next_seq(), RequestKind::Read, Arc::new(settler), job);
		match admission.admit_read(Arc::clone(&slot)) {
			ReadPlan::Dispatch => {
				drop(admission);
				slot.dispatch(&self.inner.dispatcher);
				tracing::trace!(seq = slot.seq(), "requests.submit_read");
			}
			ReadPlan::After(write) => {
				drop(admission);
				tracing::trace!(seq = slot.seq(), "requests.submit_read.queued");
				Gate::chain(slot, vec![write], self.inner.dispatcher.clone());
			}
		}
		future
	}

	/// Submits a mutating request.
	///
	/// Cancels every earlier read still outstanding and the previous write,
	/// then runs once the earlier reads have vacated their slots.
	pub fn submit_write<T, E, F>(&self, callback: F) -> RequestFuture<T, E>
	where
		F: FnOnce(&CancelIndicator) -> Result<T, E> + Send + 'static,
		T: Send + 'static,
		E: Send + 'static,
	{
		let (settler, future) = request_pair(CancelIndicator::new());
		let (slot, plan) = {
			let mut admission = self.inner.admission.lock();
			if admission.is_closed() {
				admission.record_rejection();
				drop(admission);
				tracing::debug!(kind = "write", "requests.submit.rejected");
				settler.fail(RequestError::ShutdownRejected);
				return future;
			}
			let job = request_job(RequestKind::Write, settler.clone(), callback);
			let slot = ExecutionSlot::new(admission.next_seq(), RequestKind::Write, Arc::new(settler), job);
			let plan = admission.admit_write(Arc::clone(&slot));
			(slot, plan)
		};

		tracing::trace!(
			seq = slot.seq(),
			cancels = plan.cancel.len(),
			waits_for = plan.wait_for.len(),
			"requests.submit_write"
		);
		for victim in &plan.cancel {
			if victim.cancel() {
				tracing::debug!(
					seq = victim.seq(),
					kind = victim.kind().as_str(),
					superseded_by = slot.seq(),
					"requests.write.supersede"
				);
			}
		}
		Gate::chain(slot, plan.wait_for, self.inner.dispatcher.clone());
		future
	}

	/// Requests cancellation of every outstanding request without closing
	/// admission. Returns how many requests this call moved to `Cancelled`.
	pub fn cancel_all(&self) -> usize {
		let slots = self.inner.admission.lock().outstanding();
		let cancelled = slots.iter().filter(|slot| slot.cancel()).count();
		tracing::debug!(outstanding = slots.len(), cancelled, "requests.cancel_all");
		cancelled
	}

	pub fn snapshot(&self) -> ManagerSnapshot {
		self.inner.admission.lock().snapshot()
	}

	pub fn is_shut_down(&self) -> bool {
		self.inner.admission.lock().is_closed()
	}
}

impl std::fmt::Debug for RequestManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RequestManager")
			.field("config", &self.inner.config)
			.field("snapshot", &self.snapshot())
			.finish()
	}
}
