// Job context as seen from inside running work

use super::cancel::CancelToken;
use super::control::JobControl;
use crate::domain::{JobId, JobInput};
use std::sync::Arc;

/// The job executing on the calling thread
#[derive(Clone)]
pub struct JobContext {
    control: Arc<JobControl>,
}

impl JobContext {
    /// `None` outside of a job
    pub fn current() -> Option<JobContext> {
        JobControl::current().map(|control| JobContext { control })
    }

    pub fn job_id(&self) -> JobId {
        self.control.job_id()
    }

    pub fn input(&self) -> &JobInput {
        self.control.input()
    }

    /// The job was cancelled; its outcome will be discarded
    pub fn is_cancelled(&self) -> bool {
        self.control.state() == crate::domain::JobState::Cancelled
    }

    /// Cancellation was requested with `interrupt = true`
    pub fn is_interrupted(&self) -> bool {
        self.control.interrupt_token().is_cancelled()
    }

    /// Signal raised when the job is cancelled with interruption
    pub fn interrupt_token(&self) -> CancelToken {
        self.control.interrupt_token()
    }
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("job_id", &self.job_id())
            .finish_non_exhaustive()
    }
}
