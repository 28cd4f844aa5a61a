use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::runtime::{Handle, Runtime};

use crate::{ConfigError, DispatchConfig, TaskFactory};

static GLOBAL_CONFIG: OnceLock<DispatchConfig> = OnceLock::new();
static GLOBAL_RT: OnceLock<Runtime> = OnceLock::new();
static SHARED_IN_FLIGHT: OnceLock<Arc<AtomicUsize>> = OnceLock::new();

/// Installs the configuration used by the global dispatch runtime.
///
/// Must run before the first dispatch; once any dispatcher has read the
/// global configuration this fails with [`ConfigError::AlreadyInstalled`].
pub fn install(config: DispatchConfig) -> Result<(), ConfigError> {
	config.validate()?;
	if GLOBAL_CONFIG.get().is_some() || GLOBAL_RT.get().is_some() {
		return Err(ConfigError::AlreadyInstalled);
	}
	let runtime = build_runtime(&config).map_err(ConfigError::Runtime)?;
	if GLOBAL_CONFIG.set(config).is_err() {
		runtime.shutdown_background();
		return Err(ConfigError::AlreadyInstalled);
	}
	if let Err(runtime) = GLOBAL_RT.set(runtime) {
		// Lost a race with lazy initialization, which already used this config.
		runtime.shutdown_background();
	}
	tracing::debug!("dispatch.runtime.installed");
	Ok(())
}

fn global_config() -> &'static DispatchConfig {
	GLOBAL_CONFIG.get_or_init(DispatchConfig::default)
}

fn shared_in_flight() -> Arc<AtomicUsize> {
	Arc::clone(SHARED_IN_FLIGHT.get_or_init(Arc::default))
}

fn global_handle() -> Handle {
	let runtime = GLOBAL_RT.get_or_init(|| build_runtime(global_config()).expect("failed to build stdext-dispatch global tokio runtime"));
	runtime.handle().clone()
}

fn build_runtime(config: &DispatchConfig) -> std::io::Result<Runtime> {
	tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.worker_threads(config.worker_threads)
		.max_blocking_threads(config.max_blocking_threads)
		.thread_name(config.thread_name.clone())
		.build()
}

/// Settings for threads a dispatcher creates itself.
#[derive(Debug, Clone)]
pub(crate) struct ThreadSpec {
	name: Arc<str>,
	stack_size: Option<usize>,
}

impl ThreadSpec {
	fn from_config(config: &DispatchConfig) -> Self {
		Self {
			name: Arc::from(config.fire_thread_name.as_str()),
			stack_size: config.thread_stack_size,
		}
	}

	pub(crate) fn builder(&self) -> std::thread::Builder {
		let builder = std::thread::Builder::new().name(self.name.to_string());
		match self.stack_size {
			Some(size) => builder.stack_size(size),
			None => builder,
		}
	}
}

/// Entry point for dispatching callables.
///
/// Holds the runtime that pool and async work is submitted to, the settings
/// for dedicated threads, and a count of work items still in flight. Clones
/// share the count, and so do all dispatchers from [`Dispatcher::current`]
/// and [`Dispatcher::global`]; one from [`Dispatcher::from_handle`] starts
/// its own.
#[derive(Debug, Clone)]
pub struct Dispatcher {
	handle: Handle,
	threads: ThreadSpec,
	in_flight: Arc<AtomicUsize>,
}

impl Dispatcher {
	/// Dispatcher on the caller's runtime, or on the global runtime when the
	/// caller is not inside one.
	pub fn current() -> Self {
		match Handle::try_current() {
			Ok(handle) => Self::with_config(handle, global_config(), shared_in_flight()),
			Err(_) => Self::global(),
		}
	}

	/// Dispatcher on the global runtime.
	pub fn global() -> Self {
		Self::with_config(global_handle(), global_config(), shared_in_flight())
	}

	/// Dispatcher on an explicit runtime with explicit thread settings.
	pub fn from_handle(handle: Handle, config: &DispatchConfig) -> Result<Self, ConfigError> {
		config.validate()?;
		Ok(Self::with_config(handle, config, Arc::default()))
	}

	fn with_config(handle: Handle, config: &DispatchConfig, in_flight: Arc<AtomicUsize>) -> Self {
		Self {
			handle,
			threads: ThreadSpec::from_config(config),
			in_flight,
		}
	}

	/// Returns the runtime this dispatcher submits work to.
	pub fn handle(&self) -> &Handle {
		&self.handle
	}

	/// Number of dispatched work items that have not finished yet.
	///
	/// Fire-and-forget dispatch is unbounded; this is the only visibility
	/// into how much of it is outstanding.
	pub fn in_flight(&self) -> usize {
		self.in_flight.load(Ordering::Acquire)
	}

	/// Task factory starting work on this dispatcher.
	pub fn factory(&self) -> TaskFactory {
		TaskFactory::new(self.clone())
	}

	pub(crate) fn threads(&self) -> &ThreadSpec {
		&self.threads
	}

	pub(crate) fn track(&self) -> InFlight {
		self.in_flight.fetch_add(1, Ordering::AcqRel);
		InFlight {
			count: Arc::clone(&self.in_flight),
		}
	}
}

/// Decrements the owning dispatcher's in-flight count when dropped.
#[derive(Debug)]
pub(crate) struct InFlight {
	count: Arc<AtomicUsize>,
}

impl Drop for InFlight {
	fn drop(&mut self) {
		self.count.fetch_sub(1, Ordering::AcqRel);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use tokio::runtime::RuntimeFlavor;

	#[tokio::test]
	async fn current_uses_ambient_runtime() {
		let dispatcher = Dispatcher::current();
		assert_eq!(dispatcher.handle().runtime_flavor(), RuntimeFlavor::CurrentThread);
	}

	#[test]
	fn current_outside_runtime_falls_back_to_global() {
		let dispatcher = Dispatcher::current();
		let handle = dispatcher.handle().clone();
		assert_eq!(handle.runtime_flavor(), RuntimeFlavor::MultiThread);
		let name = handle
			.block_on(handle.spawn(async { std::thread::current().name().map(str::to_owned) }))
			.unwrap();
		assert_eq!(name.as_deref(), Some("stdext-dispatch"));
	}

	#[tokio::test]
	async fn from_handle_rejects_invalid_config() {
		let config = DispatchConfig {
			fire_thread_name: "bad\0name".to_string(),
			..DispatchConfig::default()
		};
		let err = Dispatcher::from_handle(Handle::current(), &config).unwrap_err();
		assert!(matches!(err, ConfigError::Invalid { field: "fire_thread_name", .. }));
	}

	#[tokio::test]
	async fn in_flight_guard_balances_count() {
		let dispatcher = Dispatcher::from_handle(Handle::current(), &DispatchConfig::default()).unwrap();
		let clone = dispatcher.clone();
		let guard = dispatcher.track();
		assert_eq!(clone.in_flight(), 1);
		drop(guard);
		assert_eq!(clone.in_flight(), 0);
	}

	#[test]
	fn install_after_global_use_is_rejected() {
		let _ = Dispatcher::global();
		let err = install(DispatchConfig::default()).unwrap_err();
		assert!(matches!(err, ConfigError::AlreadyInstalled), "got {err:?}");
	}
}
