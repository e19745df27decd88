// Domain Layer - Job descriptors and transaction state

pub mod job;
pub mod transaction;

// Re-exports
pub use job::{
    ExecutionIdentity, JobId, JobInfo, JobInput, JobState, Locale, TransactionScope,
    TransportContext, UserAgent,
};
pub use transaction::{TransactionId, TransactionState};
