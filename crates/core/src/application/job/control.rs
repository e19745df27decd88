// Shared run state of one submitted job

use super::cancel::{cancel_channel, CancelSender, CancelToken};
use crate::application::context::JOB;
use crate::application::panic_guard::execute_guarded;
use crate::application::transaction::Transaction;
use crate::domain::{JobId, JobInfo, JobInput, JobState, TransactionId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// State shared between a job's handle, the registry and the worker thread
/// executing it.
pub(crate) struct JobControl {
    seq: u64,
    input: Arc<JobInput>,
    submitted_at: i64,
    state: watch::Sender<JobState>,
    interrupt: CancelSender,
    /// Set under the `transactions` lock when cancellation begins
    cancel_requested: AtomicBool,
    transactions: Mutex<HashMap<TransactionId, Arc<Transaction>>>,
}

impl JobControl {
    pub(crate) fn new(seq: u64, input: Arc<JobInput>, submitted_at: i64) -> Self {
        let (state, _) = watch::channel(JobState::Scheduled);
        let (interrupt, _) = cancel_channel();
        Self {
            seq,
            input,
            submitted_at,
            state,
            interrupt,
            cancel_requested: AtomicBool::new(false),
            transactions: Mutex::new(HashMap::new()),
        }
    }

    /// Job executing on the calling thread, if any
    pub(crate) fn current() -> Option<Arc<JobControl>> {
        JOB.get()
    }

    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }

    pub(crate) fn job_id(&self) -> JobId {
        self.input.job_id
    }

    pub(crate) fn input(&self) -> &JobInput {
        &self.input
    }

    pub(crate) fn state(&self) -> JobState {
        *self.state.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<JobState> {
        self.state.subscribe()
    }

    pub(crate) fn interrupt_token(&self) -> CancelToken {
        self.interrupt.token()
    }

    pub(crate) fn info(&self) -> JobInfo {
        JobInfo {
            job_id: self.input.job_id,
            name: self.input.display_name(),
            identity: self.input.identity.clone(),
            state: self.state(),
            submitted_at: self.submitted_at,
        }
    }

    /// Cancellation has begun, though registered transactions may still be
    /// in the middle of cancelling
    pub(crate) fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    /// Scheduled -> Running. False if the job was cancelled before start.
    pub(crate) fn try_start(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == JobState::Scheduled && !self.is_cancel_requested() {
                *state = JobState::Running;
                true
            } else {
                false
            }
        })
    }

    /// Running -> Done, delivering the outcome atomically with the
    /// transition. The outcome is discarded once cancellation has begun.
    pub(crate) fn finish(&self, deliver: impl FnOnce()) -> bool {
        self.state.send_if_modified(|state| {
            if *state == JobState::Running && !self.is_cancel_requested() {
                deliver();
                *state = JobState::Done;
                true
            } else {
                false
            }
        })
    }

    /// Cancel every transaction registered with the job, then the job.
    ///
    /// The job only reports `Cancelled` (and the interrupt is only raised)
    /// once its transactions are cancelled, so work reacting to the
    /// cancellation can no longer commit. Returns false if the job already
    /// finished, was already being cancelled, or a transaction failed to
    /// cancel.
    pub(crate) fn cancel(&self, interrupt: bool) -> bool {
        let transactions: Vec<Arc<Transaction>> = {
            let registered = self.lock_transactions();
            if self.state().is_finished() || self.cancel_requested.swap(true, Ordering::SeqCst) {
                return false;
            }
            registered.values().cloned().collect()
        };
        info!(
            job_id = self.job_id(),
            interrupt,
            transactions = transactions.len(),
            "Cancelling job"
        );

        let mut all_cancelled = true;
        for tx in &transactions {
            if !cancel_transaction(tx, interrupt) {
                all_cancelled = false;
            }
        }

        let transitioned = self.state.send_if_modified(|state| {
            if state.is_finished() {
                false
            } else {
                *state = JobState::Cancelled;
                true
            }
        });
        if !transitioned {
            warn!(job_id = self.job_id(), "Job finished before its cancellation completed");
            return false;
        }

        if interrupt {
            self.interrupt.cancel();
        }
        all_cancelled
    }

    /// Track a transaction so job cancellation reaches it. A transaction
    /// registered once cancellation has begun is cancelled immediately.
    pub(crate) fn register_transaction(&self, transaction: Arc<Transaction>) {
        {
            let mut transactions = self.lock_transactions();
            if !self.is_cancel_requested() {
                transactions.insert(transaction.id().to_string(), transaction);
                return;
            }
        }
        warn!(
            job_id = self.job_id(),
            transaction_id = %transaction.id(),
            "Transaction registered on a cancelled job"
        );
        cancel_transaction(&transaction, true);
    }

    pub(crate) fn unregister_transaction(&self, transaction: &Transaction) {
        self.lock_transactions().remove(transaction.id());
    }

    pub(crate) fn transaction_count(&self) -> usize {
        self.lock_transactions().len()
    }

    fn lock_transactions(&self) -> MutexGuard<'_, HashMap<TransactionId, Arc<Transaction>>> {
        self.transactions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn cancel_transaction(tx: &Transaction, interrupt: bool) -> bool {
    match execute_guarded(|| tx.cancel(interrupt)).into_result() {
        Ok(cancelled) => cancelled,
        Err(panic_msg) => {
            error!(transaction_id = %tx.id(), panic_msg = %panic_msg, "Transaction cancel panicked");
            false
        }
    }
}
