//! Execution slots: one submitted callback, one worker thread, one outcome.

use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use arbiter_worker::{CancelIndicator, Latch, RequestError, Settler, TaskClass, join_error_panic_message, spawn_blocking, spawn_on};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;

/// Whether a request may mutate shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum RequestKind {
	Read,
	Write,
}

impl RequestKind {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Read => "read",
			Self::Write => "write",
		}
	}

	pub(crate) const fn class(self) -> TaskClass {
		match self {
			Self::Read => TaskClass::Read,
			Self::Write => TaskClass::Write,
		}
	}
}

/// Deferred body of a slot: runs the callback and publishes its outcome.
pub(crate) type SlotJob = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Type-erased producer side of one request.
pub(crate) trait PendingRequest: Send + Sync {
	/// Trips the indicator and forces `Cancelled` if no outcome was published.
	fn cancel(&self) -> bool;
	fn is_cancel_requested(&self) -> bool;
	/// Settles as `Cancelled` if the callback never published.
	fn abandon(&self);
}

impl<T, E> PendingRequest for Settler<T, E>
where
	T: Send,
	E: Send,
{
	fn cancel(&self) -> bool {
		Settler::cancel(self)
	}

	fn is_cancel_requested(&self) -> bool {
		Settler::is_cancel_requested(self)
	}

	fn abandon(&self) {
		Settler::abandon(self);
	}
}

/// Builds the job that runs `callback` on the blocking pool and publishes its outcome.
pub(crate) fn request_job<T, E, F>(kind: RequestKind, settler: Settler<T, E>, callback: F) -> SlotJob
where
	F: FnOnce(&CancelIndicator) -> Result<T, E> + Send + 'static,
	T: Send + 'static,
	E: Send + 'static,
{
	Box::pin(async move {
		let indicator = settler.indicator().clone();
		let joined = spawn_blocking(kind.class(), move || callback(&indicator)).await;
		match joined {
			Ok(Ok(value)) => {
				settler.complete(value);
			}
			Ok(Err(err)) => {
				settler.fail(RequestError::Failed(err));
			}
			Err(err) => match join_error_panic_message(err) {
				Some(msg) => {
					tracing::warn!(kind = kind.as_str(), panic = %msg, "requests.callback.panicked");
					settler.fail(RequestError::Panicked(msg));
				}
				None => {
					settler.abandon();
				}
			},
		}
	})
}

/// Where dispatched slots run.
#[derive(Debug, Clone)]
pub(crate) struct Dispatcher {
	pub(crate) handle: Handle,
	/// Bounds concurrently running reads when configured.
	pub(crate) read_permits: Option<Arc<Semaphore>>,
}

enum SlotState {
	/// Waiting on a write or on prior reads.
	Queued(SlotJob),
	/// Handed to the worker pool; the callback will be invoked exactly once.
	Dispatched,
	Vacated,
}

/// One read or write slot.
///
/// A queued slot that is cancelled vacates immediately and never runs. A
/// dispatched slot always invokes its callback, even if cancellation arrives
/// before a worker thread picks it up; the callback then sees a cancelled
/// indicator.
pub(crate) struct ExecutionSlot {
	seq: u64,
	kind: RequestKind,
	request: Arc<dyn PendingRequest>,
	state: Mutex<SlotState>,
	vacated: Latch,
}

impl ExecutionSlot {
	pub(crate) fn new(seq: u64, kind: RequestKind, request: Arc<dyn PendingRequest>, job: SlotJob) -> Arc<Self> {
		Arc::new(Self {
			seq,
			kind,
			request,
			state: Mutex::new(SlotState::Queued(job)),
			vacated: Latch::new(),
		})
	}

	pub(crate) fn seq(&self) -> u64 {
		self.seq
	}

	pub(crate) fn kind(&self) -> RequestKind {
		self.kind
	}

	/// Opens once the callback returned or the slot was skipped.
	pub(crate) fn vacated(&self) -> &Latch {
		&self.vacated
	}

	pub(crate) fn is_vacated(&self) -> bool {
		self.vacated.is_open()
	}

	/// Requests cancellation. A still-queued slot is skipped and vacates now.
	pub(crate) fn cancel(&self) -> bool {
		let requested = self.request.cancel();
		let skipped = {
			let mut state = self.state.lock();
			if matches!(&*state, SlotState::Queued(_)) { Some(mem::replace(&mut *state, SlotState::Vacated)) } else { None }
		};
		if let Some(job) = skipped {
			drop(job);
			tracing::debug!(seq = self.seq, kind = self.kind.as_str(), "requests.slot.skip");
			self.vacated.open();
		}
		requested
	}

	/// Hands the slot to the worker pool. No-op unless still queued.
	pub(crate) fn dispatch(self: &Arc<Self>, dispatcher: &Dispatcher) {
		let job = {
			let mut state = self.state.lock();
			if !matches!(&*state, SlotState::Queued(_)) {
				return;
			}
			if self.request.is_cancel_requested() {
				let job = mem::replace(&mut *state, SlotState::Vacated);
				drop(state);
				drop(job);
				tracing::debug!(seq = self.seq, kind = self.kind.as_str(), "requests.slot.skip");
				self.vacated.open();
				return;
			}
			let SlotState::Queued(job) = mem::replace(&mut *state, SlotState::Dispatched) else {
				unreachable!()
			};
			job
		};

		tracing::trace!(seq = self.seq, kind = self.kind.as_str(), "requests.slot.dispatch");
		let slot = Arc::clone(self);
		let permits = match self.kind {
			RequestKind::Read => dispatcher.read_permits.clone(),
			RequestKind::Write => None,
		};
		// Owned by the task future, so a runtime that drops the task unpolled still vacates.
		let vacate = VacateOnDrop(Arc::clone(self));
		spawn_on(&dispatcher.handle, TaskClass::Control, async move {
			let _vacate = vacate;
			let _permit = match permits {
				Some(permits) => match permits.acquire_owned().await {
					Ok(permit) => Some(permit),
					Err(_) => {
						// Semaphore closed by shutdown.
						slot.request.cancel();
						return;
					}
				},
				None => None,
			};
			job.await;
		});
	}

	fn vacate(&self) {
		*self.state.lock() = SlotState::Vacated;
		if self.vacated.open() {
			tracing::trace!(seq = self.seq, kind = self.kind.as_str(), "requests.slot.vacate");
		}
	}
}

/// Vacates the slot when its task ends, including when the runtime drops it
/// unpolled. Settles the request as `Cancelled` if nothing was published.
struct VacateOnDrop(Arc<ExecutionSlot>);

impl Drop for VacateOnDrop {
	fn drop(&mut self) {
		self.0.request.abandon();
		self.0.vacate();
	}
}

/// Dispatches a slot once every dependency latch has opened.
///
/// Registered as continuations on the dependencies; nothing parks a thread.
pub(crate) struct Gate {
	remaining: AtomicUsize,
	slot: Arc<ExecutionSlot>,
	dispatcher: Dispatcher,
}

impl Gate {
	pub(crate) fn chain(slot: Arc<ExecutionSlot>, dependencies: Vec<Latch>, dispatcher: Dispatcher) {
		let gate = Arc::new(Self {
			remaining: AtomicUsize::new(dependencies.len() + 1),
			slot,
			dispatcher,
		});
		for dependency in dependencies {
			let gate = Arc::clone(&gate);
			dependency.on_open(move || gate.release());
		}
		gate.release();
	}

	fn release(&self) {
		if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
			self.slot.dispatch(&self.dispatcher);
		}
	}
}
