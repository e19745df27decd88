// Transaction boundary - commit, rollback and release around a unit of work

use super::{ContextDecorator, Work};
use crate::application::context::TRANSACTION;
use crate::application::job::JobControl;
use crate::application::transaction::Transaction;
use crate::domain::TransactionScope;
use crate::error::{JobError, ProcessingError, Result};
use crate::port::IdProvider;
use std::sync::Arc;
use tracing::{debug, warn};

/// Binds a transaction to the thread while the work runs.
///
/// An owning boundary commits the transaction (both phases) on success or
/// rolls it back on failure or veto, and releases it in every case. A
/// joining boundary only records the work's failure on a transaction whose
/// owner concludes it.
pub struct TransactionBoundary {
    transaction: Arc<Transaction>,
    owned: bool,
}

impl TransactionBoundary {
    pub fn new(transaction: Arc<Transaction>) -> Self {
        Self {
            transaction,
            owned: true,
        }
    }

    pub fn joining(transaction: Arc<Transaction>) -> Self {
        Self {
            transaction,
            owned: false,
        }
    }

    /// Boundary for `scope`, joining the transaction bound to the calling
    /// thread where the scope allows it.
    pub fn for_scope(scope: TransactionScope, ids: &dyn IdProvider) -> Result<Self> {
        match (scope, Transaction::current()) {
            (TransactionScope::RequiresNew, _) | (TransactionScope::Required, None) => {
                Ok(Self::new(Transaction::begin(ids)))
            }
            (TransactionScope::Required | TransactionScope::Mandatory, Some(current)) => {
                Ok(Self::joining(current))
            }
            (TransactionScope::Mandatory, None) => Err(JobError::Validation(
                "transaction scope is MANDATORY but no transaction is bound".to_string(),
            )),
        }
    }

    pub fn transaction(&self) -> &Arc<Transaction> {
        &self.transaction
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }
}

impl ContextDecorator for TransactionBoundary {
    fn decorate<T: Send + 'static>(self, work: Work<T>) -> Work<T> {
        let transaction = self.transaction;
        if !self.owned {
            return Box::new(move || {
                let result = TRANSACTION.scoped(Some(Arc::clone(&transaction)), work);
                if let Err(e) = &result {
                    transaction.add_failure(e.to_string());
                }
                result
            });
        }
        Box::new(move || {
            // drop order: release, then detach from the job
            let _registration = JobControl::current()
                .map(|job| JobRegistration::new(job, Arc::clone(&transaction)));
            let _release = ReleaseOnDrop(&transaction);

            let result = TRANSACTION.scoped(Some(Arc::clone(&transaction)), work);
            conclude(&transaction, result)
        })
    }
}

fn conclude<T>(transaction: &Transaction, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            if transaction.commit_phase1() {
                transaction.commit_phase2();
                return Ok(value);
            }
            transaction.rollback();
            Err(veto_error(transaction))
        }
        Err(e) => {
            debug!(transaction_id = %transaction.id(), error = %e, "Work failed; rolling back");
            transaction.add_failure(e.to_string());
            transaction.rollback();
            Err(e)
        }
    }
}

fn veto_error(transaction: &Transaction) -> JobError {
    if transaction.is_cancelled() {
        return JobError::Cancelled(format!("transaction {} was cancelled", transaction.id()));
    }
    warn!(transaction_id = %transaction.id(), "Commit vetoed; transaction rolled back");
    let error = ProcessingError::new(format!(
        "transaction {} rolled back: commit phase 1 failed",
        transaction.id()
    ));
    let error = transaction
        .failures()
        .iter()
        .fold(error, |error, failure| error.with_context(failure.to_string()));
    JobError::Processing(error)
}

struct ReleaseOnDrop<'a>(&'a Transaction);

impl Drop for ReleaseOnDrop<'_> {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Keeps the transaction registered with the running job so job
/// cancellation reaches it.
struct JobRegistration {
    job: Arc<JobControl>,
    transaction: Arc<Transaction>,
}

impl JobRegistration {
    fn new(job: Arc<JobControl>, transaction: Arc<Transaction>) -> Self {
        job.register_transaction(Arc::clone(&transaction));
        Self { job, transaction }
    }
}

impl Drop for JobRegistration {
    fn drop(&mut self) {
        self.job.unregister_transaction(&self.transaction);
    }
}
