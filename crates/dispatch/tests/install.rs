//! Global runtime installation. Kept in its own test binary because the
//! global configuration can only be installed once per process.

use std::sync::mpsc;
use std::time::Duration;

use stdext_dispatch::{ConfigError, DispatchConfig, Dispatcher, FaultPolicy, fire, install};

#[test]
fn installed_config_drives_global_dispatch() {
	let _ = tracing_subscriber::fmt::try_init();

	let bad = DispatchConfig {
		max_blocking_threads: 0,
		..DispatchConfig::default()
	};
	assert!(matches!(install(bad), Err(ConfigError::Invalid { field: "max_blocking_threads", .. })));

	let config = DispatchConfig::from_toml_str("worker_threads = 1\nthread_name = \"it-runtime\"\nfire_thread_name = \"it-fire\"\n").unwrap();
	install(config.clone()).unwrap();
	assert!(matches!(install(config), Err(ConfigError::AlreadyInstalled)));

	let (tx, rx) = mpsc::channel();
	fire::and_forget(
		move || {
			let _ = tx.send(std::thread::current().name().map(str::to_owned));
		},
		(),
		FaultPolicy::Ignore,
	)
	.unwrap();
	assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap().as_deref(), Some("it-fire"));

	let handle = Dispatcher::global().handle().clone();
	let runtime_thread = handle
		.block_on(handle.spawn(async { std::thread::current().name().map(str::to_owned) }))
		.unwrap();
	assert_eq!(runtime_thread.as_deref(), Some("it-runtime"));
}
