//! Fire-and-forget and on-thread-pool dispatch.
//!
//! Every helper takes the callable first, then its positional arguments as a
//! tuple, then (for fire-and-forget) the fault policy, then the cancellation
//! token where one applies. The free functions dispatch through
//! [`Dispatcher::current`]; the same operations are available as
//! [`Dispatcher`] methods for an explicit runtime.
//!
//! ```no_run
//! use stdext_dispatch::{FaultPolicy, fire};
//!
//! fire::and_forget(|x: i32, y: i32| println!("{}", x + y), (3, 4), FaultPolicy::Ignore)?;
//! # Ok::<(), stdext_dispatch::DispatchError>(())
//! ```

use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tokio_util::sync::CancellationToken;

use crate::spawn::{block_on_local, spawn_blocking, spawn_task, spawn_thread};
use crate::{CancelAware, Callable, DispatchError, DispatchKind, Dispatcher, Fault, FaultPolicy, Outcome, TaskHandle};


impl Dispatcher {
	/// Runs `f(args..)` on a new dedicated thread and returns immediately.
	///
	/// A panic or `Err` return is passed to `faults`. Fails synchronously
	/// only if the thread cannot be created.
	pub fn and_forget<F, Args>(&self, f: F, args: Args, faults: FaultPolicy) -> Result<(), DispatchError>
	where
		F: Callable<Args>,
		F::Output: Outcome,
		Args: Send + 'static,
	{
		let in_flight = self.track();
		spawn_thread(self.threads(), DispatchKind::DedicatedThread, "and_forget", move || {
			let _in_flight = in_flight;
			run_guarded(faults, || f.call(args).into_fault());
		})
		.map_err(DispatchError::Spawn)
	}

	/// Like [`Self::and_forget`], forwarding `token` to the callable.
	///
	/// The token is not checked by the helper itself.
	pub fn and_forget_cancellable<F, Args>(&self, f: F, args: Args, faults: FaultPolicy, token: CancellationToken) -> Result<(), DispatchError>
	where
		F: CancelAware<Args>,
		F::Output: Outcome,
		Args: Send + 'static,
	{
		let in_flight = self.track();
		spawn_thread(self.threads(), DispatchKind::DedicatedThread, "and_forget_cancellable", move || {
			let _in_flight = in_flight;
			run_guarded(faults, || f.call_with(args, token).into_fault());
		})
		.map_err(DispatchError::Spawn)
	}

	/// Runs the future returned by `f(args..)` on a new dedicated thread,
	/// driven by a current-thread runtime owned by that thread.
	///
	/// A panic or `Err` output is passed to `faults`, as is a failure to
	/// build the thread's runtime. Fails synchronously only if the thread
	/// cannot be created.
	pub fn and_forget_async<F, Args>(&self, f: F, args: Args, faults: FaultPolicy) -> Result<(), DispatchError>
	where
		F: Callable<Args>,
		F::Output: Future + Send + 'static,
		<F::Output as Future>::Output: Outcome + Send + 'static,
		Args: Send + 'static,
	{
		self.forget_future("and_forget_async", faults, async move { f.call(args).await })
	}

	/// Like [`Self::and_forget_async`], forwarding `token` to the callable.
	pub fn and_forget_async_cancellable<F, Args>(&self, f: F, args: Args, faults: FaultPolicy, token: CancellationToken) -> Result<(), DispatchError>
	where
		F: CancelAware<Args>,
		F::Output: Future + Send + 'static,
		<F::Output as Future>::Output: Outcome + Send + 'static,
		Args: Send + 'static,
	{
		self.forget_future("and_forget_async_cancellable", faults, async move { f.call_with(args, token).await })
	}

	fn forget_future<Fut>(&self, op: &'static str, faults: FaultPolicy, fut: Fut) -> Result<(), DispatchError>
	where
		Fut: Future + Send + 'static,
		Fut::Output: Outcome,
	{
		let in_flight = self.track();
		spawn_thread(self.threads(), DispatchKind::DedicatedThread, op, move || {
			let _in_flight = in_flight;
			run_guarded(faults, || match block_on_local(fut) {
				Ok(outcome) => outcome.into_fault(),
				Err(err) => {
					tracing::warn!(op, error = %err, "dispatch.thread_runtime.build_failed");
					Some(Fault::from_error(err))
				}
			});
		})
		.map_err(DispatchError::Spawn)
	}

	/// Runs `f(args..)` on the runtime's blocking pool.
	///
	/// If `cancel` is already cancelled when the work item starts, the
	/// callable is skipped and the handle resolves to
	/// [`DispatchError::Cancelled`].
	pub fn on_thread_pool<F, Args>(&self, f: F, args: Args, cancel: Option<CancellationToken>) -> TaskHandle<F::Output>
	where
		F: Callable<Args>,
		F::Output: Send + 'static,
		Args: Send + 'static,
	{
		let in_flight = self.track();
		TaskHandle::from_task(spawn_blocking(self.handle(), "on_thread_pool", move || {
			let _in_flight = in_flight;
			ensure_live(cancel.as_ref()).map(|()| f.call(args))
		}))
	}

	/// Like [`Self::on_thread_pool`], forwarding `token` to the callable.
	pub fn on_thread_pool_cancellable<F, Args>(&self, f: F, args: Args, token: CancellationToken) -> TaskHandle<F::Output>
	where
		F: CancelAware<Args>,
		F::Output: Send + 'static,
		Args: Send + 'static,
	{
		let in_flight = self.track();
		TaskHandle::from_task(spawn_blocking(self.handle(), "on_thread_pool_cancellable", move || {
			let _in_flight = in_flight;
			ensure_live(Some(&token)).map(|()| f.call_with(args, token))
		}))
	}

	/// Runs the future returned by `f(args..)` as a runtime task.
	///
	/// `cancel` is checked once before the callable is invoked.
	pub fn on_thread_pool_async<F, Args>(&self, f: F, args: Args, cancel: Option<CancellationToken>) -> TaskHandle<<F::Output as Future>::Output>
	where
		F: Callable<Args>,
		F::Output: Future + Send + 'static,
		<F::Output as Future>::Output: Send + 'static,
		Args: Send + 'static,
	{
		let in_flight = self.track();
		TaskHandle::from_task(spawn_task(self.handle(), DispatchKind::RuntimeTask, "on_thread_pool_async", async move {
			let _in_flight = in_flight;
			if let Err(err) = ensure_live(cancel.as_ref()) {
				return Err(err);
			}
			Ok(f.call(args).await)
		}))
	}

	/// Like [`Self::on_thread_pool_async`], forwarding `token` to the callable.
	pub fn on_thread_pool_async_cancellable<F, Args>(&self, f: F, args: Args, token: CancellationToken) -> TaskHandle<<F::Output as Future>::Output>
	where
		F: CancelAware<Args>,
		F::Output: Future + Send + 'static,
		<F::Output as Future>::Output: Send + 'static,
		Args: Send + 'static,
	{
		let in_flight = self.track();
		TaskHandle::from_task(spawn_task(self.handle(), DispatchKind::RuntimeTask, "on_thread_pool_async_cancellable", async move {
			let _in_flight = in_flight;
			if let Err(err) = ensure_live(Some(&token)) {
				return Err(err);
			}
			Ok(f.call_with(args, token).await)
		}))
	}
}

/// Runs `work`, turning a panic or reported fault into one report.
fn run_guarded<W>(faults: FaultPolicy, work: W)
where
	W: FnOnce() -> Option<Fault>,
{
	let fault = catch_unwind(AssertUnwindSafe(work)).unwrap_or_else(|payload| Some(Fault::from_panic(payload)));
	if let Some(fault) = fault {
		faults.report(DispatchKind::DedicatedThread, fault);
	}
}

pub(crate) fn ensure_live(cancel: Option<&CancellationToken>) -> Result<(), DispatchError> {
	if cancel.is_some_and(CancellationToken::is_cancelled) {
		return Err(DispatchError::Cancelled);
	}
	Ok(())
}

/// See [`Dispatcher::and_forget`].
pub fn and_forget<F, Args>(f: F, args: Args, faults: FaultPolicy) -> Result<(), DispatchError>
where
	F: Callable<Args>,
	F::Output: Outcome,
	Args: Send + 'static,
{
	Dispatcher::current().and_forget(f, args, faults)
}

/// See [`Dispatcher::and_forget_cancellable`].
pub fn and_forget_cancellable<F, Args>(f: F, args: Args, faults: FaultPolicy, token: CancellationToken) -> Result<(), DispatchError>
where
	F: CancelAware<Args>,
	F::Output: Outcome,
	Args: Send + 'static,
{
	Dispatcher::current().and_forget_cancellable(f, args, faults, token)
}

/// See [`Dispatcher::and_forget_async`].
pub fn and_forget_async<F, Args>(f: F, args: Args, faults: FaultPolicy) -> Result<(), DispatchError>
where
	F: Callable<Args>,
	F::Output: Future + Send + 'static,
	<F::Output as Future>::Output: Outcome + Send + 'static,
	Args: Send + 'static,
{
	Dispatcher::current().and_forget_async(f, args, faults)
}

/// See [`Dispatcher::and_forget_async_cancellable`].
pub fn and_forget_async_cancellable<F, Args>(f: F, args: Args, faults: FaultPolicy, token: CancellationToken) -> Result<(), DispatchError>
where
	F: CancelAware<Args>,
	F::Output: Future + Send + 'static,
	<F::Output as Future>::Output: Outcome + Send + 'static,
	Args: Send + 'static,
{
	Dispatcher::current().and_forget_async_cancellable(f, args, faults, token)
}

/// See [`Dispatcher::on_thread_pool`].
pub fn on_thread_pool<F, Args>(f: F, args: Args, cancel: Option<CancellationToken>) -> TaskHandle<F::Output>
where
	F: Callable<Args>,
	F::Output: Send + 'static,
	Args: Send + 'static,
{
	Dispatcher::current().on_thread_pool(f, args, cancel)
}

/// See [`Dispatcher::on_thread_pool_cancellable`].
pub fn on_thread_pool_cancellable<F, Args>(f: F, args: Args, token: CancellationToken) -> TaskHandle<F::Output>
where
	F: CancelAware<Args>,
	F::Output: Send + 'static,
	Args: Send + 'static,
{
	Dispatcher::current().on_thread_pool_cancellable(f, args, token)
}

/// See [`Dispatcher::on_thread_pool_async`].
pub fn on_thread_pool_async<F, Args>(f: F, args: Args, cancel: Option<CancellationToken>) -> TaskHandle<<F::Output as Future>::Output>
where
	F: Callable<Args>,
	F::Output: Future + Send + 'static,
	<F::Output as Future>::Output: Send + 'static,
	Args: Send + 'static,
{
	Dispatcher::current().on_thread_pool_async(f, args, cancel)
}

/// See [`Dispatcher::on_thread_pool_async_cancellable`].
pub fn on_thread_pool_async_cancellable<F, Args>(f: F, args: Args, token: CancellationToken) -> TaskHandle<<F::Output as Future>::Output>
where
	F: CancelAware<Args>,
	F::Output: Future + Send + 'static,
	<F::Output as Future>::Output: Send + 'static,
	Args: Send + 'static,
{
	Dispatcher::current().on_thread_pool_async_cancellable(f, args, token)
}
