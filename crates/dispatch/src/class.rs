/// Execution unit a dispatch helper hands work to, used for log metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchKind {
	/// A fresh OS thread spawned for one fire-and-forget work item.
	DedicatedThread,
	/// A task on the async runtime, used for asynchronous pool callables.
	RuntimeTask,
	/// The runtime's shared blocking pool, used for synchronous pool work.
	BlockingPool,
	/// A dedicated thread started by a long-running task factory.
	LongRunning,
}

impl DispatchKind {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::DedicatedThread => "dedicated_thread",
			Self::RuntimeTask => "runtime_task",
			Self::BlockingPool => "blocking_pool",
			Self::LongRunning => "long_running",
		}
	}
}
