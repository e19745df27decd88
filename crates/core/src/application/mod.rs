// Application Layer - Transactions, decorators and job execution

pub mod context;
pub mod decorators;
pub mod job;
pub mod panic_guard;
pub mod transaction;

// Re-exports
pub use decorators::{ContextDecorator, Work};
pub use job::{JobContext, JobHandle, JobManager, JobManagerConfig};
pub use panic_guard::{execute_guarded, PanicGuardResult};
pub use transaction::{Transaction, TransactionFailure};
