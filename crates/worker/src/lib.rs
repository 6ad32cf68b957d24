//! Worker runtime primitives for cooperative request execution.
//!
//! This crate provides the leaf building blocks the request scheduler is made of:
//! * [`TaskClass`]: execution classes used for spawn routing and tracing
//! * [`spawn_on`] / [`spawn_blocking`]: classified spawn helpers, with a global
//!   runtime fallback from [`runtime_handle`]
//! * [`CancelIndicator`]: cooperative cancellation flag polled by callbacks
//! * [`RequestFuture`] / [`Settler`]: single-assignment result cell with a
//!   cancellation override
//! * [`Latch`]: one-shot completion signal with continuations

mod cell;
mod class;
mod error;
mod future;
mod latch;
mod spawn;
mod token;

pub use class::TaskClass;
pub use error::RequestError;
pub use future::{FutureStatus, RequestFuture, Settler, request_pair};
pub use latch::{Latch, Opened};
pub use spawn::{runtime_handle, spawn_blocking, spawn_on};
pub use token::CancelIndicator;

/// Continuation run once on settlement, on whichever thread settles.
pub type Continuation = Box<dyn FnOnce() + Send + 'static>;

/// Extracts the panic message from a failed join, if the task panicked.
///
/// Returns `None` when the task was cancelled rather than panicking.
pub fn join_error_panic_message(err: tokio::task::JoinError) -> Option<String> {
	if !err.is_panic() {
		return None;
	}
	let payload = err.into_panic();
	if let Some(msg) = payload.downcast_ref::<&'static str>() {
		return Some((*msg).to_string());
	}
	if let Some(msg) = payload.downcast_ref::<String>() {
		return Some(msg.clone());
	}
	Some("<non-string panic payload>".to_string())
}
