use std::mem;
use std::task::{Context, Poll, Waker};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::Continuation;

struct CellState<V> {
	settled: bool,
	/// Present from settlement until a consumer takes it.
	value: Option<V>,
	wakers: Vec<Waker>,
	continuations: Vec<Continuation>,
}

/// Single-assignment cell shared by [`RequestFuture`](crate::RequestFuture)
/// and [`Latch`](crate::Latch).
///
/// Exactly one [`settle`](Self::settle) call wins. Blocking waiters park on a
/// condvar, async waiters register wakers, continuations run on the settling
/// thread after the lock is released.
pub(crate) struct SettleCell<V> {
	state: Mutex<CellState<V>>,
	settled: Condvar,
}

impl<V> Default for SettleCell<V> {
	fn default() -> Self {
		Self {
			state: Mutex::new(CellState {
				settled: false,
				value: None,
				wakers: Vec::new(),
				continuations: Vec::new(),
			}),
			settled: Condvar::new(),
		}
	}
}

impl<V> SettleCell<V> {
	/// Stores `value` if the cell is still pending. Returns `false` otherwise.
	pub(crate) fn settle(&self, value: V) -> bool {
		self.settle_with(|| value)
	}

	/// Stores the value produced by `make` if the cell is still pending.
	///
	/// `make` runs under the cell lock, so the pending check and the store are
	/// one transition.
	pub(crate) fn settle_with(&self, make: impl FnOnce() -> V) -> bool {
		let (wakers, continuations) = {
			let mut state = self.state.lock();
			if state.settled {
				return false;
			}
			state.settled = true;
			state.value = Some(make());
			(mem::take(&mut state.wakers), mem::take(&mut state.continuations))
		};
		self.settled.notify_all();
		for waker in wakers {
			waker.wake();
		}
		for continuation in continuations {
			continuation();
		}
		true
	}

	pub(crate) fn is_settled(&self) -> bool {
		self.state.lock().settled
	}

	/// Runs `continuation` on settlement, or immediately if already settled.
	pub(crate) fn on_settled(&self, continuation: Continuation) {
		{
			let mut state = self.state.lock();
			if !state.settled {
				state.continuations.push(continuation);
				return;
			}
		}
		continuation();
	}

	/// Parks the calling thread until the cell settles.
	pub(crate) fn wait(&self) {
		let mut state = self.state.lock();
		while !state.settled {
			self.settled.wait(&mut state);
		}
	}

	/// Parks until the cell settles or `deadline` passes. Returns whether it settled.
	pub(crate) fn wait_until(&self, deadline: Instant) -> bool {
		let mut state = self.state.lock();
		while !state.settled {
			if self.settled.wait_until(&mut state, deadline).timed_out() {
				return state.settled;
			}
		}
		true
	}

	/// Blocks until settled, then moves the value out.
	pub(crate) fn take_blocking(&self) -> Option<V> {
		let mut state = self.state.lock();
		while !state.settled {
			self.settled.wait(&mut state);
		}
		state.value.take()
	}

	/// Registers `cx`'s waker unless settled.
	pub(crate) fn poll_settled(&self, cx: &mut Context<'_>) -> Poll<()> {
		let mut state = self.state.lock();
		if state.settled {
			return Poll::Ready(());
		}
		register_waker(&mut state.wakers, cx.waker());
		Poll::Pending
	}

	/// Moves the value out once settled, registering `cx`'s waker otherwise.
	pub(crate) fn poll_take(&self, cx: &mut Context<'_>) -> Poll<Option<V>> {
		let mut state = self.state.lock();
		if state.settled {
			return Poll::Ready(state.value.take());
		}
		register_waker(&mut state.wakers, cx.waker());
		Poll::Pending
	}
}

fn register_waker(wakers: &mut Vec<Waker>, waker: &Waker) {
	if wakers.iter().any(|w| w.will_wake(waker)) {
		return;
	}
	wakers.push(waker.clone());
}
