//! Read/write request scheduling for long-lived interactive services.
//!
//! [`RequestManager`] interleaves non-mutating *read* requests, which run in
//! parallel, with mutating *write* requests, which supersede earlier work.
//! Every submission returns a [`RequestFuture`]; every callback receives a
//! [`CancelIndicator`] it is expected to poll.
//!
//! Cancellation is cooperative. A request whose cancellation was requested
//! settles as [`RequestError::Cancelled`] immediately, but its callback keeps
//! running until it observes the indicator or returns.

mod admission;
mod config;
mod manager;
mod shutdown;
mod slot;

pub use admission::ManagerSnapshot;
pub use arbiter_worker::{CancelIndicator, FutureStatus, RequestError, RequestFuture};
pub use config::{ConfigError, ManagerConfig};
pub use manager::RequestManager;
pub use shutdown::ShutdownReport;
