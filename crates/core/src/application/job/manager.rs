// Job Manager - submits units of work to the worker pool

use super::config::JobManagerConfig;
use super::constants::{CORE_THREAD_SUFFIX, WORKER_KEEP_ALIVE};
use super::control::JobControl;
use super::handle::JobHandle;
use super::registry::JobRegistry;
use crate::application::context::JOB;
use crate::application::decorators::{compose, unit_of_work, TransactionBoundary, Work};
use crate::application::panic_guard::execute_guarded;
use crate::domain::{ExecutionIdentity, JobId, JobInfo, JobInput};
use crate::error::{BoxError, JobError, ProcessingError, Result};
use crate::port::id_provider::UuidProvider;
use crate::port::time_provider::SystemTimeProvider;
use crate::port::{AsyncNotifier, IdProvider, TimeProvider};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Executes units of work on a bounded pool of worker threads, each wrapped
/// in a fresh transaction and the engine's context decorators.
pub struct JobManager {
    config: JobManagerConfig,
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    registry: Arc<JobRegistry>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    shut_down: AtomicBool,
}

impl JobManager {
    pub fn new(config: JobManagerConfig) -> Result<Self> {
        Self::with_providers(config, Arc::new(UuidProvider), Arc::new(SystemTimeProvider))
    }

    /// Create a manager with explicit id and time sources (deterministic tests)
    pub fn with_providers(
        config: JobManagerConfig,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let prefix = config.thread_name_prefix.clone();
        let counter = AtomicUsize::new(0);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(config.worker_threads)
            .thread_keep_alive(WORKER_KEEP_ALIVE)
            .thread_name_fn(move || worker_thread_name(&prefix, &counter))
            .enable_all()
            .build()
            .map_err(|e| JobError::InvalidState(format!("Failed to start worker pool: {}", e)))?;

        info!(
            worker_threads = config.worker_threads,
            thread_name_prefix = %config.thread_name_prefix,
            "Job manager started"
        );

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            config,
            registry: Arc::new(JobRegistry::default()),
            id_provider,
            time_provider,
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &JobManagerConfig {
        &self.config
    }

    /// Submit a unit of work. Fails fast if the input carries no execution
    /// identity or the manager is shut down.
    pub fn submit<T, E, F>(&self, work: F, input: JobInput) -> Result<JobHandle<T>>
    where
        T: Send + 'static,
        E: Into<BoxError>,
        F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
    {
        self.dispatch(unit_of_work(work), input, None)
    }

    /// Like `submit`, reporting the outcome to `notifier` as well
    pub fn submit_with_notifier<T, E, F>(
        &self,
        work: F,
        input: JobInput,
        notifier: Arc<dyn AsyncNotifier<T>>,
    ) -> Result<JobHandle<T>>
    where
        T: Send + 'static,
        E: Into<BoxError>,
        F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
    {
        self.dispatch(unit_of_work(work), input, Some(notifier))
    }

    fn dispatch<T: Send + 'static>(
        &self,
        work: Work<T>,
        input: JobInput,
        notifier: Option<Arc<dyn AsyncNotifier<T>>>,
    ) -> Result<JobHandle<T>> {
        if input.identity.is_none() {
            return Err(JobError::Validation(format!(
                "job {} has no execution identity",
                input.job_id
            )));
        }
        if self.is_shutdown() {
            return Err(JobError::InvalidState(
                "job manager is shut down".to_string(),
            ));
        }

        // resolved on the submitting thread, where a joinable transaction is bound
        let boundary =
            TransactionBoundary::for_scope(input.transaction_scope, self.id_provider.as_ref())
                .map_err(|e| match e {
                    JobError::Validation(msg) => {
                        JobError::Validation(format!("job {}: {}", input.job_id, msg))
                    }
                    other => other,
                })?;
        let transaction_id = boundary.transaction().id().to_string();
        let joined = !boundary.is_owned();

        let input = Arc::new(input);
        let chain = compose(work, &input, boundary, notifier);

        let seq = self.registry.next_seq();
        let control = Arc::new(JobControl::new(
            seq,
            Arc::clone(&input),
            self.time_provider.now_millis(),
        ));
        let (result_tx, result_rx) = oneshot::channel();
        self.registry.insert(Arc::clone(&control));

        debug!(
            job_id = input.job_id,
            name = %input.display_name(),
            transaction_id = %transaction_id,
            joined,
            "Job submitted"
        );

        let registry = Arc::clone(&self.registry);
        let job = Arc::clone(&control);
        self.handle.spawn_blocking(move || {
            run_job(&job, chain, result_tx);
            registry.remove(job.seq());
        });

        Ok(JobHandle::new(control, result_rx))
    }

    /// Cancel (with interruption) every active job matching both id and
    /// identity. False if none matched or any cancellation failed.
    pub fn cancel(&self, job_id: JobId, identity: &ExecutionIdentity) -> bool {
        let matched = self.registry.matching(|job| {
            job.job_id() == job_id && job.input().identity.as_ref() == Some(identity)
        });
        if matched.is_empty() {
            debug!(job_id, identity = %identity, "No active job to cancel");
            return false;
        }
        matched
            .iter()
            .map(|job| job.cancel(true))
            .fold(true, |all, cancelled| all && cancelled)
    }

    /// Scheduled and running jobs
    pub fn active_jobs(&self) -> Vec<JobInfo> {
        let mut jobs: Vec<JobInfo> = self.registry.snapshot().iter().map(|j| j.info()).collect();
        jobs.sort_by_key(|j| (j.submitted_at, j.job_id));
        jobs
    }

    pub fn is_shutdown(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Stop accepting work, cancel active jobs and wait up to the configured
    /// timeout for the pool to drain.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let cancelled = self.cancel_all();
        info!(cancelled, "Shutting down job manager");

        let runtime = self
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(runtime) = runtime else {
            return;
        };
        if Handle::try_current().is_ok() {
            // a runtime cannot be dropped from within an async context
            warn!("Shutdown called from an async context; not waiting for workers");
            runtime.shutdown_background();
        } else {
            runtime.shutdown_timeout(Duration::from_millis(self.config.shutdown_timeout_ms));
        }
        info!("Job manager stopped");
    }

    fn cancel_all(&self) -> usize {
        self.registry
            .snapshot()
            .iter()
            .filter(|job| job.cancel(true))
            .count()
    }
}

impl Drop for JobManager {
    fn drop(&mut self) {
        self.shut_down.store(true, Ordering::SeqCst);
        let runtime = self
            .runtime
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(runtime) = runtime {
            self.cancel_all();
            runtime.shutdown_background();
        }
    }
}

/// The async core thread is spawned first, while the runtime is built; job
/// workers are numbered from 1 after it.
fn worker_thread_name(prefix: &str, counter: &AtomicUsize) -> String {
    match counter.fetch_add(1, Ordering::Relaxed) {
        0 => format!("{}-{}", prefix, CORE_THREAD_SUFFIX),
        n => format!("{}-{}", prefix, n),
    }
}

/// Worker side of a job: start unless cancelled, run the chain with the job
/// bound to the thread, publish the outcome unless cancelled meanwhile.
fn run_job<T>(job: &Arc<JobControl>, chain: Work<T>, result_tx: oneshot::Sender<Result<T>>) {
    if !job.try_start() {
        debug!(job_id = job.job_id(), "Job cancelled before start; skipping");
        return;
    }

    let outcome = JOB.scoped(Some(Arc::clone(job)), || execute_guarded(chain).into_result());
    let outcome = match outcome {
        Ok(result) => result.map_err(JobError::into_processing),
        Err(panic_msg) => {
            error!(job_id = job.job_id(), panic_msg = %panic_msg, "Job panicked");
            Err(JobError::Processing(ProcessingError::new(format!(
                "Job panicked: {}",
                panic_msg
            ))))
        }
    };

    let failed = outcome.is_err();
    if job.finish(move || {
        let _ = result_tx.send(outcome);
    }) {
        debug!(job_id = job.job_id(), failed, "Job finished");
    } else {
        debug!(job_id = job.job_id(), "Job cancelled while running; outcome discarded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::context::TRANSACTION;
    use crate::application::transaction::Transaction;
    use crate::domain::{JobState, TransactionScope, TransactionState};
    use crate::port::transaction_member::mocks::{MemberCall, RecordingMember};
    use crate::port::id_provider::SequentialIdProvider;
    use crate::port::time_provider::FixedTimeProvider;
    use std::sync::mpsc;

    fn manager(workers: usize) -> JobManager {
        JobManager::with_providers(
            JobManagerConfig::default().with_worker_threads(workers),
            Arc::new(SequentialIdProvider::new("tx")),
            Arc::new(FixedTimeProvider(1_700_000_000_000)),
        )
        .unwrap()
    }

    fn input(job_id: JobId) -> JobInput {
        JobInput::new(job_id).with_identity(ExecutionIdentity::new("s-1", "alice"))
    }

    #[test]
    fn test_submit_without_identity_fails_fast() {
        let manager = manager(1);
        let err = manager
            .submit(|| Ok::<_, BoxError>(()), JobInput::new(1))
            .unwrap_err();
        assert!(matches!(err, JobError::Validation(_)));
        assert!(manager.active_jobs().is_empty());
    }

    #[test]
    fn test_submit_and_join() {
        let manager = manager(2);
        let handle = manager
            .submit(|| Ok::<_, BoxError>(21 * 2), input(1))
            .unwrap();
        assert_eq!(handle.join_blocking().unwrap(), 42);
    }

    #[test]
    fn test_failure_reaches_caller_as_processing_error() {
        let manager = manager(1);
        let handle = manager
            .submit(|| Err::<(), BoxError>("boom".into()), input(1))
            .unwrap();
        match handle.join_blocking() {
            Err(JobError::Processing(e)) => assert_eq!(e.message(), "boom"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_cancel_before_start_never_runs() {
        let manager = manager(1);
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let blocker = manager
            .submit(
                move || release_rx.recv().map_err(|e| Box::new(e) as BoxError),
                input(1),
            )
            .unwrap();

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let queued = manager
            .submit(
                move || {
                    flag.store(true, Ordering::SeqCst);
                    Ok::<_, BoxError>(())
                },
                input(2),
            )
            .unwrap();

        assert!(queued.cancel(false));
        assert!(queued.is_cancelled());
        release_tx.send(()).unwrap();
        blocker.join_blocking().unwrap();

        assert!(queued.join_blocking().unwrap_err().is_cancelled());
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_cancel_after_done_returns_false() {
        let manager = manager(1);
        let handle = manager.submit(|| Ok::<_, BoxError>(1), input(1)).unwrap();
        let identity = ExecutionIdentity::new("s-1", "alice");

        while !handle.is_done() {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!handle.cancel(true));
        assert!(!manager.cancel(1, &identity));
        assert_eq!(handle.state(), JobState::Done);
    }

    #[test]
    fn test_cancel_by_id_requires_matching_identity() {
        let manager = manager(1);
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let handle = manager
            .submit(
                move || release_rx.recv().map_err(|e| Box::new(e) as BoxError),
                input(7),
            )
            .unwrap();

        assert!(!manager.cancel(7, &ExecutionIdentity::new("s-2", "mallory")));
        assert!(manager.cancel(7, &ExecutionIdentity::new("s-1", "alice")));
        let _ = release_tx.send(());
        assert!(handle.join_blocking().unwrap_err().is_cancelled());
    }

    #[test]
    fn test_active_jobs_lists_running_work() {
        let manager = manager(1);
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let handle = manager
            .submit(
                move || release_rx.recv().map_err(|e| Box::new(e) as BoxError),
                input(3).with_name("import"),
            )
            .unwrap();

        let jobs = manager.active_jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, "import");
        assert_eq!(jobs[0].submitted_at, 1_700_000_000_000);

        release_tx.send(()).unwrap();
        handle.join_blocking().unwrap();
    }

    #[test]
    fn test_first_job_runs_on_worker_one() {
        let manager = JobManager::new(
            JobManagerConfig::default()
                .with_worker_threads(1)
                .with_thread_name_prefix("pool"),
        )
        .unwrap();
        let name = manager
            .submit(
                || Ok::<_, BoxError>(std::thread::current().name().map(str::to_string)),
                input(1),
            )
            .unwrap()
            .join_blocking()
            .unwrap();
        assert_eq!(name.as_deref(), Some("pool-1"));

        let counter = AtomicUsize::new(0);
        assert_eq!(worker_thread_name("w", &counter), "w-core");
        assert_eq!(worker_thread_name("w", &counter), "w-1");
    }

    #[test]
    fn test_mandatory_scope_requires_bound_transaction() {
        let manager = manager(1);
        let err = manager
            .submit(
                || Ok::<_, BoxError>(()),
                input(4).with_transaction_scope(TransactionScope::Mandatory),
            )
            .unwrap_err();
        match err {
            JobError::Validation(msg) => assert!(msg.starts_with("job 4:")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(manager.active_jobs().is_empty());
    }

    #[test]
    fn test_required_scope_joins_submitter_transaction() {
        let manager = manager(1);
        let outer = Arc::new(Transaction::new("tx-outer"));
        let member = Arc::new(RecordingMember::new("m", true));

        let registered = Arc::clone(&member);
        let seen = TRANSACTION.scoped(Some(Arc::clone(&outer)), || {
            manager
                .submit(
                    move || -> std::result::Result<String, BoxError> {
                        let tx = Transaction::current().ok_or("no transaction")?;
                        tx.register(registered)?;
                        Ok(tx.id().to_string())
                    },
                    input(5).with_transaction_scope(TransactionScope::Required),
                )
                .unwrap()
                .join_blocking()
                .unwrap()
        });

        assert_eq!(seen, "tx-outer");
        assert!(member.calls().is_empty());
        assert_eq!(outer.state(), TransactionState::Active);

        // the owner concludes it
        assert!(outer.commit_phase1());
        outer.commit_phase2();
        outer.release();
        assert_eq!(
            member.calls(),
            vec![MemberCall::CommitPhase1, MemberCall::CommitPhase2, MemberCall::Release]
        );
    }

    #[test]
    fn test_requires_new_ignores_submitter_transaction() {
        let manager = manager(1);
        let outer = Arc::new(Transaction::new("tx-outer"));
        let seen = TRANSACTION.scoped(Some(Arc::clone(&outer)), || {
            manager
                .submit(
                    || -> std::result::Result<String, BoxError> {
                        Ok(Transaction::current().ok_or("no transaction")?.id().to_string())
                    },
                    input(6),
                )
                .unwrap()
                .join_blocking()
                .unwrap()
        });
        assert_eq!(seen, "tx-1");
        assert_eq!(outer.state(), TransactionState::Active);
    }

    #[test]
    fn test_submit_after_shutdown_is_rejected() {
        let manager = manager(1);
        manager.shutdown();
        assert!(manager.is_shutdown());
        let err = manager.submit(|| Ok::<_, BoxError>(()), input(1)).unwrap_err();
        assert!(matches!(err, JobError::InvalidState(_)));
    }
}
