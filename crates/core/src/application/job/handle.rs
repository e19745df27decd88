// Job Handle - caller side of a submitted job

use super::control::JobControl;
use crate::application::transaction::Transaction;
use crate::domain::{JobId, JobInfo, JobState};
use crate::error::{JobError, Result};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Handle to a submitted job: inspect it, cancel it, wait for its result.
pub struct JobHandle<T> {
    control: Arc<JobControl>,
    result: oneshot::Receiver<Result<T>>,
}

impl<T> JobHandle<T> {
    pub(crate) fn new(control: Arc<JobControl>, result: oneshot::Receiver<Result<T>>) -> Self {
        Self { control, result }
    }

    pub fn job_id(&self) -> JobId {
        self.control.job_id()
    }

    pub fn state(&self) -> JobState {
        self.control.state()
    }

    pub fn info(&self) -> JobInfo {
        self.control.info()
    }

    /// Finished normally or cancelled
    pub fn is_done(&self) -> bool {
        self.state().is_finished()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == JobState::Cancelled
    }

    /// Cancel the job and its registered transactions. False if the job had
    /// already finished or a transaction could not be cancelled.
    pub fn cancel(&self, interrupt: bool) -> bool {
        self.control.cancel(interrupt)
    }

    /// Make job cancellation reach `transaction` as well
    pub fn register_transaction(&self, transaction: Arc<Transaction>) {
        self.control.register_transaction(transaction);
    }

    pub fn unregister_transaction(&self, transaction: &Transaction) {
        self.control.unregister_transaction(transaction);
    }

    /// Wait for the outcome. A cancelled job yields `JobError::Cancelled`
    /// as soon as it is cancelled, even while its work is still unwinding.
    pub async fn join(self) -> Result<T> {
        let Self {
            control,
            mut result,
        } = self;
        let mut state = control.subscribe();
        let cancellation = async move {
            let _ = state.wait_for(|s| *s == JobState::Cancelled).await;
        };

        tokio::select! {
            biased;
            outcome = &mut result => match outcome {
                Ok(outcome) => outcome,
                Err(_) if control.is_cancel_requested() => Err(cancelled(&control)),
                Err(_) => Err(JobError::InvalidState(format!(
                    "job {} ended without delivering a result",
                    control.job_id()
                ))),
            },
            _ = cancellation => Err(cancelled(&control)),
        }
    }

    /// Blocking variant of `join` for callers outside an async context
    pub fn join_blocking(self) -> Result<T> {
        futures::executor::block_on(self.join())
    }
}

impl<T> std::fmt::Debug for JobHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("job_id", &self.job_id())
            .field("state", &self.state())
            .finish()
    }
}

fn cancelled(control: &JobControl) -> JobError {
    JobError::Cancelled(format!("job {} was cancelled", control.job_id()))
}
