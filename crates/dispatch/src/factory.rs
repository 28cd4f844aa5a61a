//! Task-factory start helpers.

use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::fire::ensure_live;
use crate::spawn::{block_on_local, spawn_thread};
use crate::{CancelAware, Callable, DispatchError, DispatchKind, Dispatcher, Fault, TaskHandle};

/// How a [`TaskFactory`] schedules the work it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskCreation {
	/// Shared pool: the blocking pool for sync work, a runtime task for async work.
	#[default]
	Default,
	/// One dedicated thread per work item, for work expected to hold a
	/// thread for a long time.
	LongRunning,
}

/// Starts work with a shared cancellation token and creation option.
///
/// The token, if set, is checked once immediately before each callable is
/// invoked and is the token handed to cancellation-aware callables.
#[derive(Debug, Clone)]
pub struct TaskFactory {
	dispatcher: Dispatcher,
	cancel: Option<CancellationToken>,
	creation: TaskCreation,
}

impl Default for TaskFactory {
	fn default() -> Self {
		Self::new(Dispatcher::current())
	}
}

impl TaskFactory {
	/// Creates a factory with no token and [`TaskCreation::Default`].
	pub fn new(dispatcher: Dispatcher) -> Self {
		Self {
			dispatcher,
			cancel: None,
			creation: TaskCreation::Default,
		}
	}

	/// Sets the token checked before, and passed to, every started callable.
	#[must_use]
	pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
		self.cancel = Some(token);
		self
	}

	/// Sets the creation option.
	#[must_use]
	pub fn with_creation(mut self, creation: TaskCreation) -> Self {
		self.creation = creation;
		self
	}

	/// Shorthand for `with_creation(TaskCreation::LongRunning)`.
	#[must_use]
	pub fn long_running(self) -> Self {
		self.with_creation(TaskCreation::LongRunning)
	}

	/// Returns the creation option work is started with.
	pub fn creation(&self) -> TaskCreation {
		self.creation
	}

	/// Returns the factory token, if one was set.
	pub fn cancellation(&self) -> Option<&CancellationToken> {
		self.cancel.as_ref()
	}

	/// Starts `f(args..)`.
	pub fn start_new<F, Args>(&self, f: F, args: Args) -> TaskHandle<F::Output>
	where
		F: Callable<Args>,
		F::Output: Send + 'static,
		Args: Send + 'static,
	{
		let cancel = self.cancel.clone();
		match self.creation {
			TaskCreation::Default => self.dispatcher.on_thread_pool(f, args, cancel),
			TaskCreation::LongRunning => self.start_thread("start_new", move || ensure_live(cancel.as_ref()).map(|()| f.call(args))),
		}
	}

	/// Starts `f(args.., token)` with the factory token, or a fresh one.
	pub fn start_new_cancellable<F, Args>(&self, f: F, args: Args) -> TaskHandle<F::Output>
	where
		F: CancelAware<Args>,
		F::Output: Send + 'static,
		Args: Send + 'static,
	{
		let token = self.cancel.clone().unwrap_or_default();
		match self.creation {
			TaskCreation::Default => self.dispatcher.on_thread_pool_cancellable(f, args, token),
			TaskCreation::LongRunning => self.start_thread("start_new_cancellable", move || ensure_live(Some(&token)).map(|()| f.call_with(args, token))),
		}
	}

	/// Starts the future returned by `f(args..)`.
	///
	/// Long-running factories drive the future on the dedicated thread with a
	/// current-thread runtime owned by that thread; tasks it spawns run there
	/// too. Failing to build that runtime resolves the handle to
	/// [`DispatchError::Spawn`].
	pub fn start_new_async<F, Args>(&self, f: F, args: Args) -> TaskHandle<<F::Output as Future>::Output>
	where
		F: Callable<Args>,
		F::Output: Future + Send + 'static,
		<F::Output as Future>::Output: Send + 'static,
		Args: Send + 'static,
	{
		let cancel = self.cancel.clone();
		match self.creation {
			TaskCreation::Default => self.dispatcher.on_thread_pool_async(f, args, cancel),
			TaskCreation::LongRunning => self.start_thread("start_new_async", move || {
				if let Err(err) = ensure_live(cancel.as_ref()) {
					return Err(err);
				}
				block_on_local(async move { f.call(args).await }).map_err(DispatchError::Spawn)
			}),
		}
	}

	/// Starts the future returned by `f(args.., token)`, scheduled as in
	/// [`Self::start_new_async`].
	pub fn start_new_async_cancellable<F, Args>(&self, f: F, args: Args) -> TaskHandle<<F::Output as Future>::Output>
	where
		F: CancelAware<Args>,
		F::Output: Future + Send + 'static,
		<F::Output as Future>::Output: Send + 'static,
		Args: Send + 'static,
	{
		let token = self.cancel.clone().unwrap_or_default();
		match self.creation {
			TaskCreation::Default => self.dispatcher.on_thread_pool_async_cancellable(f, args, token),
			TaskCreation::LongRunning => self.start_thread("start_new_async_cancellable", move || {
				if let Err(err) = ensure_live(Some(&token)) {
					return Err(err);
				}
				block_on_local(async move { f.call_with(args, token).await }).map_err(DispatchError::Spawn)
			}),
		}
	}

	fn start_thread<T, W>(&self, op: &'static str, work: W) -> TaskHandle<T>
	where
		T: Send + 'static,
		W: FnOnce() -> Result<T, DispatchError> + Send + 'static,
	{
		let (tx, rx) = oneshot::channel();
		let in_flight = self.dispatcher.track();
		let spawned = spawn_thread(self.dispatcher.threads(), DispatchKind::LongRunning, op, move || {
			let result = catch_unwind(AssertUnwindSafe(work)).unwrap_or_else(|payload| Err(DispatchError::Panicked(Fault::from_panic(payload))));
			// Settle the count before the handle can observe completion.
			drop(in_flight);
			let _ = tx.send(result);
		});
		match spawned {
			Ok(()) => TaskHandle::from_thread(rx),
			Err(err) => {
				tracing::warn!(op, error = %err, "dispatch.long_running.spawn_failed");
				let (tx, rx) = oneshot::channel();
				let _ = tx.send(Err(DispatchError::Spawn(err)));
				TaskHandle::from_thread(rx)
			}
		}
	}
}
