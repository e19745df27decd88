// Job engine constants (No magic values)
use std::time::Duration;

/// Default size of the worker pool
pub const DEFAULT_WORKER_THREADS: usize = 8;

/// Default prefix for worker thread names (`<prefix>-<n>`)
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "conduit-worker";

/// Graceful runtime shutdown timeout (5 seconds)
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5000;

/// Keep-alive of idle worker threads before they are reclaimed
pub const WORKER_KEEP_ALIVE: Duration = Duration::from_secs(10);

/// Environment overrides for `JobManagerConfig::from_env`
pub const ENV_WORKER_THREADS: &str = "CONDUIT_WORKER_THREADS";
pub const ENV_THREAD_NAME_PREFIX: &str = "CONDUIT_THREAD_NAME_PREFIX";
pub const ENV_SHUTDOWN_TIMEOUT_MS: &str = "CONDUIT_SHUTDOWN_TIMEOUT_MS";

/// Name suffix of the runtime's async core thread (`<prefix>-core`)
pub const CORE_THREAD_SUFFIX: &str = "core";
