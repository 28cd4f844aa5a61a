//! Error types for dispatching and configuration.

use std::path::PathBuf;

use thiserror::Error;
use tokio::task::JoinError;

use crate::Fault;

/// Errors reported by dispatch helpers and completion handles.
#[derive(Debug, Error)]
pub enum DispatchError {
	/// The thread or runtime backing the dispatch could not be created.
	#[error("failed to start dispatch unit: {0}")]
	Spawn(#[source] std::io::Error),

	/// Cancellation was requested before the callable was invoked.
	#[error("dispatch cancelled before the callable ran")]
	Cancelled,

	/// The callable panicked.
	#[error(transparent)]
	Panicked(Fault),

	/// The work was aborted before it produced a result.
	#[error("dispatched work was aborted")]
	Aborted,
}

impl DispatchError {
	/// Returns `true` for [`DispatchError::Cancelled`].
	pub fn is_cancelled(&self) -> bool {
		matches!(self, Self::Cancelled)
	}

	/// Returns the fault if the callable panicked.
	pub fn fault(&self) -> Option<&Fault> {
		match self {
			Self::Panicked(fault) => Some(fault),
			_ => None,
		}
	}

	pub(crate) fn from_join(err: JoinError) -> Self {
		if err.is_panic() {
			Self::Panicked(Fault::from_panic(err.into_panic()))
		} else {
			Self::Aborted
		}
	}
}

/// Errors that can occur when loading or installing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// Error parsing TOML syntax or shape.
	#[error("TOML parse error: {0}")]
	Parse(#[from] toml::de::Error),

	/// A field holds a value the dispatcher cannot use.
	#[error("invalid value for '{field}': {reason}")]
	Invalid {
		/// The offending field.
		field: &'static str,
		/// Why the value was rejected.
		reason: String,
	},

	/// The global configuration was already installed or already used.
	#[error("global dispatch configuration is already installed")]
	AlreadyInstalled,

	/// The global runtime could not be built.
	#[error("failed to build dispatch runtime: {0}")]
	Runtime(#[source] std::io::Error),
}
