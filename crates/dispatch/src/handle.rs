use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::DispatchError;

/// Completion handle for work dispatched to a pool or long-running thread.
///
/// Resolves to the callable's value, or to the [`DispatchError`] that kept it
/// from producing one.
#[derive(Debug)]
#[must_use = "dropping a TaskHandle detaches the work; await it to observe the result"]
pub struct TaskHandle<T> {
	inner: Inner<T>,
}

#[derive(Debug)]
enum Inner<T> {
	Task(JoinHandle<Result<T, DispatchError>>),
	Thread(oneshot::Receiver<Result<T, DispatchError>>),
}

impl<T> TaskHandle<T> {
	pub(crate) fn from_task(handle: JoinHandle<Result<T, DispatchError>>) -> Self {
		Self { inner: Inner::Task(handle) }
	}

	pub(crate) fn from_thread(rx: oneshot::Receiver<Result<T, DispatchError>>) -> Self {
		Self { inner: Inner::Thread(rx) }
	}

	/// Requests that runtime-backed work be aborted.
	///
	/// Work that has not started resolves to [`DispatchError::Aborted`].
	/// Blocking work that is already running, and work on long-running
	/// threads, runs to completion.
	pub fn abort(&self) {
		if let Inner::Task(handle) = &self.inner {
			handle.abort();
		}
	}
}

impl<T> Future for TaskHandle<T> {
	type Output = Result<T, DispatchError>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match &mut self.get_mut().inner {
			Inner::Task(handle) => Pin::new(handle).poll(cx).map(|joined| joined.unwrap_or_else(|err| Err(DispatchError::from_join(err)))),
			Inner::Thread(rx) => Pin::new(rx).poll(cx).map(|received| received.unwrap_or(Err(DispatchError::Aborted))),
		}
	}
}
