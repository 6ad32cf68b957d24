//! Admission record: the only place sequencing decisions are made.
//!
//! The record is mutated under the manager's admission lock, so each decision
//! is atomic relative to concurrent submitters. It only decides; signalling
//! cancellation and dispatching happen after the lock is released.

use std::sync::Arc;

use arbiter_worker::Latch;

use crate::slot::ExecutionSlot;

/// How an admitted read proceeds.
pub(crate) enum ReadPlan {
	/// No write outstanding: run now, concurrently with other reads.
	Dispatch,
	/// Wait for the current write to vacate its slot.
	After(Latch),
}

/// How an admitted write proceeds.
pub(crate) struct WritePlan {
	/// Earlier reads and the superseded write, to be cancelled.
	pub(crate) cancel: Vec<Arc<ExecutionSlot>>,
	/// Vacancy of every read admitted before the write.
	pub(crate) wait_for: Vec<Latch>,
}

/// Counters and outstanding slots.
#[derive(Default)]
pub(crate) struct Admission {
	closed: bool,
	next_seq: u64,
	/// Most recently admitted write while it still occupies its slot.
	current_write: Option<Arc<ExecutionSlot>>,
	/// Reads that have not vacated, in admission order.
	reads: Vec<Arc<ExecutionSlot>>,
	/// Writes that have not vacated, including superseded ones.
	writes: Vec<Arc<ExecutionSlot>>,
	admitted_reads: u64,
	admitted_writes: u64,
	superseded_writes: u64,
	rejected: u64,
}

impl Admission {
	pub(crate) fn is_closed(&self) -> bool {
		self.closed
	}

	/// Next monotonic submission sequence number.
	pub(crate) fn next_seq(&mut self) -> u64 {
		self.next_seq = self.next_seq.wrapping_add(1);
		self.next_seq
	}

	pub(crate) fn record_rejection(&mut self) {
		self.rejected = self.rejected.wrapping_add(1);
	}

	pub(crate) fn admit_read(&mut self, slot: Arc<ExecutionSlot>) -> ReadPlan {
		self.prune();
		let plan = match &self.current_write {
			Some(write) => ReadPlan::After(write.vacated().clone()),
			None => ReadPlan::Dispatch,
		};
		self.reads.push(slot);
		self.admitted_reads = self.admitted_reads.wrapping_add(1);
		plan
	}

	pub(crate) fn admit_write(&mut self, slot: Arc<ExecutionSlot>) -> WritePlan {
		self.prune();
		let mut cancel = self.reads.clone();
		let wait_for = self.reads.iter().map(|read| read.vacated().clone()).collect();
		if let Some(previous) = self.current_write.replace(Arc::clone(&slot)) {
			self.superseded_writes = self.superseded_writes.wrapping_add(1);
			cancel.push(previous);
		}
		self.writes.push(slot);
		self.admitted_writes = self.admitted_writes.wrapping_add(1);
		WritePlan { cancel, wait_for }
	}

	/// Every outstanding slot, writes first.
	pub(crate) fn outstanding(&mut self) -> Vec<Arc<ExecutionSlot>> {
		self.prune();
		self.writes.iter().chain(self.reads.iter()).cloned().collect()
	}

	/// Closes admission and hands back every outstanding slot.
	pub(crate) fn close(&mut self) -> Vec<Arc<ExecutionSlot>> {
		self.closed = true;
		let slots = self.outstanding();
		self.current_write = None;
		self.reads.clear();
		self.writes.clear();
		slots
	}

	pub(crate) fn snapshot(&mut self) -> ManagerSnapshot {
		self.prune();
		ManagerSnapshot {
			admitted_reads: self.admitted_reads,
			admitted_writes: self.admitted_writes,
			superseded_writes: self.superseded_writes,
			rejected: self.rejected,
			outstanding_reads: self.reads.len(),
			outstanding_writes: self.writes.len(),
			write_current: self.current_write.is_some(),
			closed: self.closed,
		}
	}

	fn prune(&mut self) {
		self.reads.retain(|slot| !slot.is_vacated());
		self.writes.retain(|slot| !slot.is_vacated());
		if self.current_write.as_ref().is_some_and(|write| write.is_vacated()) {
			self.current_write = None;
		}
	}
}

/// Point-in-time view of the manager's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ManagerSnapshot {
	pub admitted_reads: u64,
	pub admitted_writes: u64,
	/// Writes that were still outstanding when a newer write was admitted.
	pub superseded_writes: u64,
	/// Submissions refused after shutdown.
	pub rejected: u64,
	pub outstanding_reads: usize,
	pub outstanding_writes: usize,
	/// Whether a write currently holds back newly admitted reads.
	pub write_current: bool,
	pub closed: bool,
}
