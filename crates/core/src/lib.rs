// Conduit Core - Transactional job execution engine
// NO infrastructure dependencies (hexagonal: transports plug in through ports)

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use application::{JobContext, JobHandle, JobManager, JobManagerConfig, Transaction};
pub use error::{BoxError, JobError, ProcessingError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
