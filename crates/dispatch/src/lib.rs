//! Dispatch helpers for running callables off the caller's thread.
//!
//! * [`fire`]: fire-and-forget on a dedicated thread, with faults routed to
//!   a [`FaultPolicy`], and on-thread-pool dispatch returning a
//!   [`TaskHandle`].
//! * [`TaskFactory`]: start helpers with a shared cancellation token and a
//!   default or long-running creation option.
//!
//! Positional arguments travel as a tuple of up to eight elements; see
//! [`Callable`] and [`CancelAware`]. Scheduling itself is tokio's.

mod callable;
mod class;
mod config;
mod error;
mod factory;
mod fault;
pub mod fire;
mod handle;
mod runtime;
mod spawn;

pub use callable::{CancelAware, Callable};
pub use class::DispatchKind;
pub use config::DispatchConfig;
pub use error::{ConfigError, DispatchError};
pub use factory::{TaskCreation, TaskFactory};
pub use fault::{Delivery, Fault, FaultHandler, FaultPolicy, Outcome, panic_message};
pub use handle::TaskHandle;
pub use runtime::{Dispatcher, install};
pub use tokio_util::sync::CancellationToken;
