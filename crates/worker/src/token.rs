use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

/// Cooperative cancellation flag handed to every request callback.
///
/// Clones share one flag. The flag moves from "not cancelled" to "cancelled"
/// at most once and never back. [`is_cancelled`](Self::is_cancelled) is a
/// single atomic load, so callbacks may poll it in tight loops.
///
/// Cancellation is advisory: nothing stops a callback that never polls.
#[derive(Debug, Clone, Default)]
pub struct CancelIndicator {
	/// Decides which [`cancel`](Self::cancel) call won. `CancellationToken::cancel`
	/// returns nothing, and supersede/cancel-all accounting needs exactly one winner.
	flag: Arc<AtomicBool>,
	/// Wakes async waiters in [`cancelled`](Self::cancelled).
	token: CancellationToken,
}

impl CancelIndicator {
	/// Creates an indicator that is not cancelled.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns true once cancellation has been requested.
	#[inline]
	pub fn is_cancelled(&self) -> bool {
		self.flag.load(Ordering::Acquire)
	}

	/// Requests cancellation.
	///
	/// Returns `true` only for the call that flipped the flag.
	pub fn cancel(&self) -> bool {
		if self.flag.swap(true, Ordering::AcqRel) {
			return false;
		}
		self.token.cancel();
		true
	}

	/// Future resolving when cancellation is requested.
	pub async fn cancelled(&self) {
		self.token.cancelled().await;
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;

	#[test]
	fn cancel_flips_exactly_once() {
		let indicator = CancelIndicator::new();
		assert!(!indicator.is_cancelled());
		assert!(indicator.cancel());
		assert!(!indicator.cancel());
		assert!(indicator.is_cancelled());
	}

	#[test]
	fn clones_share_the_flag() {
		let indicator = CancelIndicator::new();
		let observer = indicator.clone();
		indicator.cancel();
		assert!(observer.is_cancelled());
	}

	#[test]
	fn racing_cancels_have_one_winner() {
		let indicator = CancelIndicator::new();
		let barrier = Arc::new(std::sync::Barrier::new(8));
		let threads: Vec<_> = (0..8)
			.map(|_| {
				let (indicator, barrier) = (indicator.clone(), Arc::clone(&barrier));
				std::thread::spawn(move || {
					barrier.wait();
					indicator.cancel()
				})
			})
			.collect();
		let winners = threads.into_iter().map(|t| t.join().unwrap()).filter(|won| *won).count();
		assert_eq!(winners, 1);
		assert!(indicator.is_cancelled());
	}

	#[tokio::test]
	async fn cancelled_future_wakes_on_cancel() {
		let indicator = CancelIndicator::new();
		let waiter = indicator.clone();
		let task = tokio::spawn(async move { waiter.cancelled().await });
		tokio::task::yield_now().await;
		indicator.cancel();
		tokio::time::timeout(Duration::from_secs(1), task)
			.await
			.expect("cancelled() should resolve")
			.expect("task should not panic");
	}
}
