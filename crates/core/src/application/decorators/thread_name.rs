// Thread-name decoration

use super::{ContextDecorator, Work};
use crate::application::context::THREAD_NAME;
use tracing::info_span;

const THREAD_PREFIX: &str = "thread:";
const JOB_SEPARATOR: &str = ";job:";

/// Display name of the calling thread: the decorated name while a job runs,
/// otherwise the OS thread name.
pub fn current_thread_name() -> String {
    THREAD_NAME.get().unwrap_or_else(|| {
        std::thread::current()
            .name()
            .unwrap_or("unnamed")
            .to_string()
    })
}

/// Strip a previous decoration so nested jobs do not stack names
pub fn original_thread_name(name: &str) -> &str {
    name.strip_prefix(THREAD_PREFIX)
        .and_then(|rest| rest.split_once(JOB_SEPARATOR).map(|(original, _)| original))
        .unwrap_or(name)
}

/// Renames the thread to `thread:<original>;job:<job name>` while the work
/// runs and enters a `job` tracing span carrying the same information.
pub struct ThreadNameDecorator {
    job_name: String,
}

impl ThreadNameDecorator {
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
        }
    }
}

impl ContextDecorator for ThreadNameDecorator {
    fn decorate<T: Send + 'static>(self, work: Work<T>) -> Work<T> {
        let job_name = self.job_name;
        Box::new(move || {
            let current = current_thread_name();
            let original = original_thread_name(&current).to_string();
            let decorated = format!("{THREAD_PREFIX}{original}{JOB_SEPARATOR}{job_name}");

            let span = info_span!("job", thread = %original, name = %job_name);
            let _entered = span.enter();
            THREAD_NAME.scoped(Some(decorated), work)
        })
    }
}
