// Registry of jobs that are scheduled or running

use super::control::JobControl;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Active jobs keyed by an internal sequence number; submitter job ids are
/// not required to be unique.
#[derive(Default)]
pub(crate) struct JobRegistry {
    jobs: Mutex<HashMap<u64, Arc<JobControl>>>,
    next_seq: AtomicU64,
}

impl JobRegistry {
    pub(crate) fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn insert(&self, job: Arc<JobControl>) {
        self.lock().insert(job.seq(), job);
    }

    pub(crate) fn remove(&self, seq: u64) {
        self.lock().remove(&seq);
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<JobControl>> {
        self.lock().values().cloned().collect()
    }

    pub(crate) fn matching(&self, filter: impl Fn(&JobControl) -> bool) -> Vec<Arc<JobControl>> {
        self.lock()
            .values()
            .filter(|job| filter(job))
            .cloned()
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, Arc<JobControl>>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
