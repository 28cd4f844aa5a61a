//! Fault records and handler delivery for dispatched work.

use std::any::Any;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use tokio::runtime::Handle;

use crate::DispatchKind;

/// Extracts the message from a panic payload.
///
/// Returns `None` when the payload is neither a `&'static str` nor a `String`.
pub fn panic_message(payload: &(dyn Any + Send)) -> Option<&str> {
	payload
		.downcast_ref::<&'static str>()
		.copied()
		.or_else(|| payload.downcast_ref::<String>().map(String::as_str))
}

/// Fault captured when a dispatched callable terminated abnormally.
///
/// Owns the original panic payload or the original error value, so handlers
/// can inspect the concrete type that was raised.
pub struct Fault {
	message: String,
	source: FaultSource,
}

enum FaultSource {
	// Mutex only to make the payload shareable; it is taken at most once.
	Panic(Mutex<Option<Box<dyn Any + Send>>>),
	Error(anyhow::Error),
}

impl Fault {
	/// Wraps a panic payload caught from a callable.
	pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
		let message = panic_message(payload.as_ref()).unwrap_or("<non-string panic payload>").to_string();
		Self {
			message,
			source: FaultSource::Panic(Mutex::new(Some(payload))),
		}
	}

	/// Wraps an error value returned by a callable.
	pub fn from_error(error: impl Into<anyhow::Error>) -> Self {
		let error = error.into();
		Self {
			message: format!("{error:#}"),
			source: FaultSource::Error(error),
		}
	}

	/// Returns a readable rendering of the fault.
	pub fn message(&self) -> &str {
		&self.message
	}

	/// Returns `true` if the callable panicked.
	pub fn is_panic(&self) -> bool {
		matches!(self.source, FaultSource::Panic(_))
	}

	/// Returns the error value if the callable returned `Err`.
	pub fn error(&self) -> Option<&anyhow::Error> {
		match &self.source {
			FaultSource::Error(error) => Some(error),
			FaultSource::Panic(_) => None,
		}
	}

	/// Downcasts the returned error to its concrete type.
	pub fn downcast_error_ref<E>(&self) -> Option<&E>
	where
		E: fmt::Display + fmt::Debug + Send + Sync + 'static,
	{
		self.error().and_then(|error| error.downcast_ref::<E>())
	}

	/// Returns `true` if the panic payload is a `T`.
	pub fn panic_payload_is<T: Any>(&self) -> bool {
		match &self.source {
			FaultSource::Panic(payload) => payload.lock().unwrap_or_else(PoisonError::into_inner).as_ref().is_some_and(|p| p.is::<T>()),
			FaultSource::Error(_) => false,
		}
	}

	/// Consumes the fault and returns the original panic payload.
	///
	/// The payload can be re-raised with [`std::panic::resume_unwind`].
	pub fn into_panic(self) -> Option<Box<dyn Any + Send>> {
		match self.source {
			FaultSource::Panic(payload) => payload.into_inner().unwrap_or_else(PoisonError::into_inner),
			FaultSource::Error(_) => None,
		}
	}
}

impl fmt::Debug for Fault {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Fault")
			.field("kind", &if self.is_panic() { "panic" } else { "error" })
			.field("message", &self.message)
			.finish()
	}
}

impl fmt::Display for Fault {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.is_panic() {
			write!(f, "callable panicked: {}", self.message)
		} else {
			write!(f, "callable failed: {}", self.message)
		}
	}
}

impl std::error::Error for Fault {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match &self.source {
			FaultSource::Error(error) => Some(error.as_ref()),
			FaultSource::Panic(_) => None,
		}
	}
}

/// Where a fault handler runs.
#[derive(Debug, Clone, Default)]
pub enum Delivery {
	/// On the thread that observed the fault.
	#[default]
	Inline,
	/// As a task spawned onto the given runtime.
	Runtime(Handle),
}

impl Delivery {
	/// Captures the calling context: the current runtime if there is one,
	/// otherwise [`Delivery::Inline`].
	pub fn captured() -> Self {
		Handle::try_current().map(Self::Runtime).unwrap_or(Self::Inline)
	}
}

/// One-shot callback receiving the fault of a fire-and-forget dispatch.
pub struct FaultHandler {
	callback: Box<dyn FnOnce(Fault) + Send + 'static>,
	delivery: Delivery,
}

impl FaultHandler {
	/// Creates a handler delivered on the caller's captured context.
	pub fn new<F>(callback: F) -> Self
	where
		F: FnOnce(Fault) + Send + 'static,
	{
		Self {
			callback: Box::new(callback),
			delivery: Delivery::captured(),
		}
	}

	/// Overrides where the handler runs.
	#[must_use]
	pub fn deliver_on(mut self, delivery: Delivery) -> Self {
		self.delivery = delivery;
		self
	}

	/// Returns the configured delivery target.
	pub fn delivery(&self) -> &Delivery {
		&self.delivery
	}

	pub(crate) fn deliver(self, kind: DispatchKind, fault: Fault) {
		let callback = self.callback;
		match self.delivery {
			Delivery::Inline => {
				tracing::trace!(dispatch_kind = kind.as_str(), delivery = "inline", "dispatch.fault.deliver");
				callback(fault);
			}
			Delivery::Runtime(handle) => {
				tracing::trace!(dispatch_kind = kind.as_str(), delivery = "runtime", "dispatch.fault.deliver");
				drop(handle.spawn(async move { callback(fault) }));
			}
		}
	}
}

impl fmt::Debug for FaultHandler {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FaultHandler").field("delivery", &self.delivery).finish_non_exhaustive()
	}
}

/// What a fire-and-forget dispatch does with a fault.
#[derive(Debug)]
pub enum FaultPolicy {
	/// Drop the fault after logging it at debug level.
	Ignore,
	/// Forward the fault to a handler exactly once.
	Handle(FaultHandler),
}

impl FaultPolicy {
	/// Shorthand for a [`FaultHandler::new`] policy.
	pub fn handle<F>(callback: F) -> Self
	where
		F: FnOnce(Fault) + Send + 'static,
	{
		Self::Handle(FaultHandler::new(callback))
	}

	pub(crate) fn report(self, kind: DispatchKind, fault: Fault) {
		match self {
			Self::Ignore => {
				tracing::debug!(dispatch_kind = kind.as_str(), fault = %fault, "dispatch.fault.ignored");
			}
			Self::Handle(handler) => handler.deliver(kind, fault),
		}
	}
}

impl From<FaultHandler> for FaultPolicy {
	fn from(handler: FaultHandler) -> Self {
		Self::Handle(handler)
	}
}

/// Return values a fire-and-forget callable may produce.
///
/// `()` never faults. `Result` faults on `Err`; the `Ok` value is dropped.
pub trait Outcome {
	/// Converts the return value into a fault, if it represents one.
	fn into_fault(self) -> Option<Fault>;
}

impl Outcome for () {
	fn into_fault(self) -> Option<Fault> {
		None
	}
}

impl<T, E> Outcome for Result<T, E>
where
	E: Into<anyhow::Error>,
{
	fn into_fault(self) -> Option<Fault> {
		self.err().map(Fault::from_error)
	}
}

#[cfg(test)]
mod tests {
	use std::sync::mpsc;

	use super::*;

	#[derive(Debug, thiserror::Error, PartialEq, Eq)]
	#[error("disk full on {0}")]
	struct DiskFull(&'static str);

	#[test]
	fn extracts_static_str_payload() {
		let payload: Box<dyn Any + Send> = Box::new("boom-str");
		assert_eq!(panic_message(payload.as_ref()), Some("boom-str"));
	}

	#[test]
	fn extracts_string_payload() {
		let payload: Box<dyn Any + Send> = Box::new(String::from("boom-string"));
		assert_eq!(panic_message(payload.as_ref()), Some("boom-string"));
	}

	#[test]
	fn opaque_payload_has_no_message() {
		let payload: Box<dyn Any + Send> = Box::new(42_u32);
		assert_eq!(panic_message(payload.as_ref()), None);
		let fault = Fault::from_panic(payload);
		assert_eq!(fault.message(), "<non-string panic payload>");
		assert!(fault.panic_payload_is::<u32>());
		let raw = fault.into_panic().expect("panic fault keeps payload");
		assert_eq!(raw.downcast_ref::<u32>(), Some(&42));
	}

	#[test]
	fn caught_panic_keeps_original_payload() {
		let payload = std::panic::catch_unwind(|| std::panic::panic_any(DiskFull("sda"))).unwrap_err();
		let fault = Fault::from_panic(payload);
		assert!(fault.is_panic());
		assert!(fault.panic_payload_is::<DiskFull>());
		assert!(fault.error().is_none());
	}

	#[test]
	fn error_fault_downcasts_to_original_type() {
		let fault = Fault::from_error(DiskFull("sdb"));
		assert!(!fault.is_panic());
		assert_eq!(fault.message(), "disk full on sdb");
		assert_eq!(fault.downcast_error_ref::<DiskFull>(), Some(&DiskFull("sdb")));
		assert!(fault.into_panic().is_none());
	}

	#[test]
	fn outcome_classifies_results() {
		assert!(().into_fault().is_none());
		assert!(Ok::<u8, DiskFull>(1).into_fault().is_none());
		let fault = Err::<(), _>(anyhow::anyhow!("nope")).into_fault().expect("err is a fault");
		assert_eq!(fault.message(), "nope");
	}

	#[test]
	fn inline_delivery_runs_on_calling_thread() {
		let (tx, rx) = mpsc::channel();
		let handler = FaultHandler::new(move |fault: Fault| {
			let _ = tx.send((std::thread::current().id(), fault.message().to_string()));
		});
		assert!(matches!(handler.delivery(), Delivery::Inline));
		handler.deliver(DispatchKind::DedicatedThread, Fault::from_error(anyhow::anyhow!("late")));
		let (thread, message) = rx.recv().expect("handler ran");
		assert_eq!(thread, std::thread::current().id());
		assert_eq!(message, "late");
	}

	#[tokio::test]
	async fn captured_delivery_targets_current_runtime() {
		let (tx, rx) = tokio::sync::oneshot::channel();
		let handler = FaultHandler::new(move |fault: Fault| {
			let _ = tx.send(fault.is_panic());
		});
		assert!(matches!(handler.delivery(), Delivery::Runtime(_)));
		handler.deliver(DispatchKind::RuntimeTask, Fault::from_panic(Box::new("x")));
		assert_eq!(rx.await.ok(), Some(true));
	}

	#[test]
	fn ignore_policy_drops_fault() {
		FaultPolicy::Ignore.report(DispatchKind::BlockingPool, Fault::from_error(anyhow::anyhow!("dropped")));
	}
}
