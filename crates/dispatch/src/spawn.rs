use std::future::Future;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::DispatchKind;
use crate::runtime::ThreadSpec;

/// Spawns an async task on the given runtime.
pub(crate) fn spawn_task<F>(handle: &Handle, kind: DispatchKind, op: &'static str, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tracing::trace!(dispatch_kind = kind.as_str(), op, "dispatch.spawn_task");
	handle.spawn(fut)
}

/// Spawns blocking work on the runtime's blocking pool.
pub(crate) fn spawn_blocking<F, R>(handle: &Handle, op: &'static str, f: F) -> JoinHandle<R>
where
	F: FnOnce() -> R + Send + 'static,
	R: Send + 'static,
{
	tracing::trace!(dispatch_kind = DispatchKind::BlockingPool.as_str(), op, "dispatch.spawn_blocking");
	handle.spawn_blocking(f)
}

/// Spawns a detached, named OS thread.
pub(crate) fn spawn_thread<F>(threads: &ThreadSpec, kind: DispatchKind, op: &'static str, f: F) -> std::io::Result<()>
where
	F: FnOnce() + Send + 'static,
{
	tracing::trace!(dispatch_kind = kind.as_str(), op, "dispatch.spawn_thread");
	threads.builder().spawn(f).map(drop)
}

/// Drives `fut` to completion on a current-thread runtime owned by the
/// calling thread.
///
/// Tasks the future spawns land on that runtime and are dropped with it.
pub(crate) fn block_on_local<F: Future>(fut: F) -> std::io::Result<F::Output> {
	let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
	Ok(runtime.block_on(fut))
}
