// Decorators - context established around a unit of work

mod chain;
mod notifier;
mod thread_name;
mod thread_slot;
mod transaction_boundary;

pub(crate) use chain::compose;
pub use notifier::AsyncNotifierDecorator;
pub use thread_name::{current_thread_name, original_thread_name, ThreadNameDecorator};
pub use thread_slot::ThreadSlotDecorator;
pub use transaction_boundary::TransactionBoundary;

use crate::application::panic_guard::{execute_guarded, PanicGuardResult};
use crate::error::{BoxError, JobError, ProcessingError, Result};
use tracing::error;

/// A unit of work after adaptation: panics are caught, errors are engine errors
pub type Work<T> = Box<dyn FnOnce() -> Result<T> + Send + 'static>;

/// Wraps a unit of work so that some context is established while it runs
/// and torn down afterwards, whatever the outcome.
pub trait ContextDecorator {
    fn decorate<T: Send + 'static>(self, work: Work<T>) -> Work<T>;
}

/// Adapt user code into the innermost link of the chain.
///
/// Errors are translated with `JobError::from_work_error`; a panic becomes a
/// processing failure so no outer decorator ever sees an unwind.
pub fn unit_of_work<T, E, F>(work: F) -> Work<T>
where
    T: Send + 'static,
    E: Into<BoxError>,
    F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
{
    Box::new(move || match execute_guarded(work) {
        PanicGuardResult::Success(Ok(value)) => Ok(value),
        PanicGuardResult::Success(Err(e)) => Err(JobError::from_work_error(e.into())),
        PanicGuardResult::Panicked(msg) => {
            error!(panic = %msg, "Unit of work panicked");
            Err(JobError::Processing(ProcessingError::new(format!(
                "Unit of work panicked: {}",
                msg
            ))))
        }
    })
}
