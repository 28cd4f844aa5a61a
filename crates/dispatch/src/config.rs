//! Dispatcher configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

const MIN_STACK_SIZE: usize = 64 * 1024;

/// Runtime and thread settings used by dispatchers.
///
/// ```toml
/// worker_threads = 4
/// max_blocking_threads = 32
/// thread_name = "app-dispatch"
/// fire_thread_name = "app-fire"
/// thread_stack_size = 262144
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
	/// Async worker threads of the global runtime.
	pub worker_threads: usize,
	/// Upper bound on threads in the blocking pool used by pool dispatch.
	pub max_blocking_threads: usize,
	/// Name given to runtime threads.
	pub thread_name: String,
	/// Name given to fire-and-forget and long-running threads.
	pub fire_thread_name: String,
	/// Stack size in bytes for dedicated threads; platform default if unset.
	pub thread_stack_size: Option<usize>,
}

impl Default for DispatchConfig {
	fn default() -> Self {
		Self {
			worker_threads: 2,
			max_blocking_threads: 64,
			thread_name: "stdext-dispatch".to_string(),
			fire_thread_name: "stdext-fire".to_string(),
			thread_stack_size: None,
		}
	}
}

impl DispatchConfig {
	/// Parses and validates a TOML document.
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	/// Reads, parses and validates a TOML file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let input = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&input)
	}

	/// Checks that every field holds a usable value.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.worker_threads == 0 {
			return Err(invalid("worker_threads", "must be > 0"));
		}
		if self.max_blocking_threads == 0 {
			return Err(invalid("max_blocking_threads", "must be > 0"));
		}
		check_thread_name("thread_name", &self.thread_name)?;
		check_thread_name("fire_thread_name", &self.fire_thread_name)?;
		if let Some(size) = self.thread_stack_size
			&& size < MIN_STACK_SIZE
		{
			return Err(invalid("thread_stack_size", format!("{size} is below the {MIN_STACK_SIZE} byte minimum")));
		}
		Ok(())
	}
}

fn check_thread_name(field: &'static str, name: &str) -> Result<(), ConfigError> {
	if name.is_empty() {
		return Err(invalid(field, "must not be empty"));
	}
	if name.contains('\0') {
		return Err(invalid(field, "must not contain NUL bytes"));
	}
	Ok(())
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
	ConfigError::Invalid { field, reason: reason.into() }
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn empty_document_yields_defaults() {
		assert_eq!(DispatchConfig::from_toml_str("").unwrap(), DispatchConfig::default());
	}

	#[test]
	fn partial_document_overrides_fields() {
		let config = DispatchConfig::from_toml_str("worker_threads = 6\nfire_thread_name = \"bg\"\nthread_stack_size = 131072\n").unwrap();
		assert_eq!(
			config,
			DispatchConfig {
				worker_threads: 6,
				fire_thread_name: "bg".to_string(),
				thread_stack_size: Some(131_072),
				..DispatchConfig::default()
			}
		);
	}

	#[test]
	fn unknown_fields_are_rejected() {
		let err = DispatchConfig::from_toml_str("workers = 3").unwrap_err();
		assert!(matches!(err, ConfigError::Parse(_)), "got {err:?}");
	}

	#[test]
	fn zero_workers_are_invalid() {
		let err = DispatchConfig::from_toml_str("worker_threads = 0").unwrap_err();
		assert!(matches!(err, ConfigError::Invalid { field: "worker_threads", .. }), "got {err:?}");
	}

	#[test]
	fn thread_names_are_checked() {
		let config = DispatchConfig {
			fire_thread_name: "a\0b".to_string(),
			..DispatchConfig::default()
		};
		assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "fire_thread_name", .. })));

		let config = DispatchConfig {
			thread_name: String::new(),
			..DispatchConfig::default()
		};
		assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "thread_name", .. })));
	}

	#[test]
	fn tiny_stacks_are_invalid() {
		let err = DispatchConfig::from_toml_str("thread_stack_size = 1024").unwrap_err();
		assert!(matches!(err, ConfigError::Invalid { field: "thread_stack_size", .. }), "got {err:?}");
	}

	#[test]
	fn load_reads_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "max_blocking_threads = 8").unwrap();
		let config = DispatchConfig::load(file.path()).unwrap();
		assert_eq!(config.max_blocking_threads, 8);
	}

	#[test]
	fn load_reports_missing_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("missing.toml");
		let err = DispatchConfig::load(&path).unwrap_err();
		match err {
			ConfigError::Io { path: reported, .. } => assert_eq!(reported, path),
			other => panic!("expected Io error, got {other:?}"),
		}
	}
}
