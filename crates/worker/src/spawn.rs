use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::TaskClass;

/// Returns the current runtime handle, falling back to a lazily built global runtime.
///
/// The fallback lets callers outside any tokio context (plain threads, blocking
/// test harnesses) submit work without owning a runtime.
pub fn runtime_handle() -> Handle {
	if let Ok(handle) = Handle::try_current() {
		return handle;
	}

	static GLOBAL_RT: OnceLock<tokio::runtime::Runtime> = OnceLock::new();
	let runtime = GLOBAL_RT.get_or_init(|| {
		tokio::runtime::Builder::new_multi_thread()
			.enable_all()
			.worker_threads(2)
			.thread_name("arbiter-worker-global")
			.build()
			.expect("failed to build arbiter-worker global tokio runtime")
	});
	runtime.handle().clone()
}

/// Spawns an async task on an explicit runtime handle.
pub fn spawn_on<F>(handle: &Handle, class: TaskClass, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tracing::trace!(worker_class = class.as_str(), "worker.spawn_on");
	handle.spawn(fut)
}

/// Spawns blocking work with worker classification metadata.
pub fn spawn_blocking<F, R>(class: TaskClass, f: F) -> JoinHandle<R>
where
	F: FnOnce() -> R + Send + 'static,
	R: Send + 'static,
{
	tracing::trace!(worker_class = class.as_str(), "worker.spawn_blocking");
	runtime_handle().spawn_blocking(f)
}
