// Job - submission, cancellation and run state of units of work

mod cancel;
mod config;
pub mod constants;
mod context;
mod control;
mod handle;
mod manager;
mod registry;

pub use cancel::{cancel_channel, CancelSender, CancelToken};
pub use config::JobManagerConfig;
pub use context::JobContext;
pub(crate) use control::JobControl;
pub use handle::JobHandle;
pub use manager::JobManager;
