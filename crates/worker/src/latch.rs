use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use crate::cell::SettleCell;

/// One-shot completion signal.
///
/// Opens at most once. Continuations registered with [`on_open`](Self::on_open)
/// run on the opening thread, or inline if the latch is already open.
#[derive(Clone, Default)]
pub struct Latch {
	cell: Arc<SettleCell<()>>,
}

impl Latch {
	pub fn new() -> Self {
		Self::default()
	}

	/// Opens the latch. Returns `true` only for the call that opened it.
	pub fn open(&self) -> bool {
		self.cell.settle(())
	}

	pub fn is_open(&self) -> bool {
		self.cell.is_settled()
	}

	/// Runs `f` once the latch opens.
	pub fn on_open(&self, f: impl FnOnce() + Send + 'static) {
		self.cell.on_settled(Box::new(f));
	}

	/// Parks the calling thread until the latch opens.
	pub fn wait(&self) {
		self.cell.wait();
	}

	/// Parks until the latch opens or `deadline` passes. Returns whether it opened.
	pub fn wait_until(&self, deadline: Instant) -> bool {
		self.cell.wait_until(deadline)
	}

	/// Future resolving once the latch opens.
	pub fn opened(&self) -> Opened {
		Opened {
			cell: Arc::clone(&self.cell),
		}
	}
}

impl fmt::Debug for Latch {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Latch").field("open", &self.is_open()).finish()
	}
}

/// Future returned by [`Latch::opened`].
pub struct Opened {
	cell: Arc<SettleCell<()>>,
}

impl Future for Opened {
	type Output = ();

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
		self.cell.poll_settled(cx)
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;

	use super::*;

	#[test]
	fn continuations_run_once_on_open() {
		let latch = Latch::new();
		let hits = Arc::new(AtomicUsize::new(0));
		for _ in 0..3 {
			let hits = Arc::clone(&hits);
			latch.on_open(move || {
				hits.fetch_add(1, Ordering::SeqCst);
			});
		}
		assert_eq!(hits.load(Ordering::SeqCst), 0);
		assert!(latch.open());
		assert!(!latch.open());
		assert_eq!(hits.load(Ordering::SeqCst), 3);
	}

	#[test]
	fn late_continuation_runs_inline() {
		let latch = Latch::new();
		latch.open();
		let hit = Arc::new(AtomicUsize::new(0));
		let h = Arc::clone(&hit);
		latch.on_open(move || {
			h.fetch_add(1, Ordering::SeqCst);
		});
		assert_eq!(hit.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn wait_until_times_out_when_closed() {
		let latch = Latch::new();
		assert!(!latch.wait_until(Instant::now() + Duration::from_millis(20)));
	}

	#[test]
	fn wait_returns_after_open_from_other_thread() {
		let latch = Latch::new();
		let opener = latch.clone();
		let thread = std::thread::spawn(move || {
			std::thread::sleep(Duration::from_millis(10));
			opener.open();
		});
		latch.wait();
		assert!(latch.is_open());
		thread.join().unwrap();
	}

	#[tokio::test]
	async fn opened_future_resolves() {
		let latch = Latch::new();
		let opener = latch.clone();
		tokio::spawn(async move {
			tokio::task::yield_now().await;
			opener.open();
		});
		tokio::time::timeout(Duration::from_secs(1), latch.opened())
			.await
			.expect("latch should open");
	}
}
