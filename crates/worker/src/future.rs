//! Single-assignment request result cell.
//!
//! A request is represented by two halves sharing one cell:
//! * [`Settler`]: producer side, held by the execution slot and the scheduler
//! * [`RequestFuture`]: consumer side, returned to the submitter
//!
//! The cell takes exactly one terminal transition. Once cancellation has been
//! requested on the request's [`CancelIndicator`], every later publication
//! resolves to [`RequestError::Cancelled`] instead of the published outcome.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use crate::cell::SettleCell;
use crate::error::RequestError;
use crate::token::CancelIndicator;

/// Externally visible state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureStatus {
	Pending,
	Completed,
	Failed,
	Cancelled,
}

impl FutureStatus {
	const fn from_u8(raw: u8) -> Self {
		match raw {
			1 => Self::Completed,
			2 => Self::Failed,
			3 => Self::Cancelled,
			_ => Self::Pending,
		}
	}

	const fn as_u8(self) -> u8 {
		match self {
			Self::Pending => 0,
			Self::Completed => 1,
			Self::Failed => 2,
			Self::Cancelled => 3,
		}
	}

	fn of<T, E>(outcome: &Result<T, RequestError<E>>) -> Self {
		match outcome {
			Ok(_) => Self::Completed,
			Err(RequestError::Cancelled) => Self::Cancelled,
			Err(_) => Self::Failed,
		}
	}

	pub const fn is_terminal(self) -> bool {
		!matches!(self, Self::Pending)
	}
}

struct Shared<T, E> {
	cell: SettleCell<Result<T, RequestError<E>>>,
	/// Mirrors the cell's terminal state; survives the value being taken.
	status: AtomicU8,
	cancel: CancelIndicator,
}

impl<T, E> Shared<T, E> {
	fn publish(&self, outcome: Result<T, RequestError<E>>) -> bool {
		self.cell.settle_with(|| {
			let outcome = if self.cancel.is_cancelled() { Err(RequestError::Cancelled) } else { outcome };
			self.status.store(FutureStatus::of(&outcome).as_u8(), Ordering::Release);
			outcome
		})
	}

	/// Trips the indicator, then forces the cell to `Cancelled` if still pending.
	fn request_cancel(&self) -> bool {
		self.cancel.cancel();
		self.publish(Err(RequestError::Cancelled))
	}

	fn status(&self) -> FutureStatus {
		FutureStatus::from_u8(self.status.load(Ordering::Acquire))
	}
}

/// Creates a linked producer/consumer pair around `cancel`.
pub fn request_pair<T, E>(cancel: CancelIndicator) -> (Settler<T, E>, RequestFuture<T, E>) {
	let shared = Arc::new(Shared {
		cell: SettleCell::default(),
		status: AtomicU8::new(FutureStatus::Pending.as_u8()),
		cancel,
	});
	(
		Settler {
			shared: Arc::clone(&shared),
		},
		RequestFuture { shared },
	)
}

/// Producer half of a request cell.
pub struct Settler<T, E> {
	shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for Settler<T, E> {
	fn clone(&self) -> Self {
		Self {
			shared: Arc::clone(&self.shared),
		}
	}
}

impl<T, E> Settler<T, E> {
	/// Indicator handed to the request's callback.
	pub fn indicator(&self) -> &CancelIndicator {
		&self.shared.cancel
	}

	/// Publishes a callback outcome, subject to the cancellation override.
	///
	/// Returns `true` if this call settled the cell.
	pub fn publish(&self, outcome: Result<T, RequestError<E>>) -> bool {
		self.shared.publish(outcome)
	}

	pub fn complete(&self, value: T) -> bool {
		self.publish(Ok(value))
	}

	pub fn fail(&self, err: RequestError<E>) -> bool {
		self.publish(Err(err))
	}

	/// Requests cancellation and forces the cell to `Cancelled` if still pending.
	pub fn cancel(&self) -> bool {
		self.shared.request_cancel()
	}

	/// Settles as `Cancelled` without tripping the indicator.
	///
	/// Used when the callback can no longer publish, e.g. its task was dropped.
	pub fn abandon(&self) -> bool {
		self.shared.publish(Err(RequestError::Cancelled))
	}

	pub fn is_settled(&self) -> bool {
		self.shared.cell.is_settled()
	}

	pub fn is_cancel_requested(&self) -> bool {
		self.shared.cancel.is_cancelled()
	}

	pub fn status(&self) -> FutureStatus {
		self.shared.status()
	}
}

/// Consumer half of a request cell.
///
/// Await it, [`join`](Self::join) it from a plain thread, or register a
/// continuation with [`on_settled`](Self::on_settled).
#[must_use = "dropping a RequestFuture discards the request's outcome"]
pub struct RequestFuture<T, E> {
	shared: Arc<Shared<T, E>>,
}

impl<T, E> RequestFuture<T, E> {
	/// Creates an already settled future.
	pub fn ready(outcome: Result<T, RequestError<E>>) -> Self {
		let (settler, future) = request_pair(CancelIndicator::new());
		settler.publish(outcome);
		future
	}

	pub fn status(&self) -> FutureStatus {
		self.shared.status()
	}

	/// Returns true once the request reached any terminal state.
	pub fn is_done(&self) -> bool {
		self.status().is_terminal()
	}

	pub fn is_cancelled(&self) -> bool {
		self.status() == FutureStatus::Cancelled
	}

	/// Abandons the request from the consumer side.
	///
	/// Trips the callback's indicator and settles as `Cancelled` unless an
	/// outcome was already published. Returns `true` if this call settled it.
	pub fn cancel(&self) -> bool {
		self.shared.request_cancel()
	}

	/// Runs `f` on settlement, or inline if already settled.
	pub fn on_settled(&self, f: impl FnOnce() + Send + 'static) {
		self.shared.cell.on_settled(Box::new(f));
	}

	/// Parks the calling thread until the request settles.
	pub fn wait(&self) {
		self.shared.cell.wait();
	}

	/// Parks until the request settles or `timeout` elapses. Returns whether it settled.
	pub fn wait_timeout(&self, timeout: Duration) -> bool {
		self.shared.cell.wait_until(Instant::now() + timeout)
	}

	/// Blocks the calling thread until settlement and returns the outcome.
	///
	/// Must not be called from inside an async task; `.await` the future instead.
	pub fn join(self) -> Result<T, RequestError<E>> {
		match self.shared.cell.take_blocking() {
			Some(outcome) => outcome,
			None => panic!("RequestFuture outcome already taken"),
		}
	}
}

impl<T, E> Future for RequestFuture<T, E> {
	type Output = Result<T, RequestError<E>>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match self.shared.cell.poll_take(cx) {
			Poll::Ready(Some(outcome)) => Poll::Ready(outcome),
			Poll::Ready(None) => panic!("RequestFuture polled after completion"),
			Poll::Pending => Poll::Pending,
		}
	}
}

impl<T, E> fmt::Debug for RequestFuture<T, E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RequestFuture").field("status", &self.status()).finish()
	}
}
