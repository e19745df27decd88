// Transaction - registry of members driving a two-phase commit protocol

use crate::application::context::TRANSACTION;
use crate::application::panic_guard::execute_guarded;
use crate::domain::{TransactionId, TransactionState};
use crate::error::{BoxError, JobError, ProcessingError, Result};
use crate::port::{IdProvider, TransactionMember};
use std::any::Any;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

/// Failure recorded outside the member protocol
pub type TransactionFailure = Arc<dyn StdError + Send + Sync + 'static>;

struct MemberEntry {
    member: Arc<dyn TransactionMember>,
    typed: Arc<dyn Any + Send + Sync>,
}

impl MemberEntry {
    fn new<M: TransactionMember + 'static>(member: Arc<M>) -> Self {
        Self {
            member: Arc::clone(&member) as Arc<dyn TransactionMember>,
            typed: member,
        }
    }
}

struct Registry {
    members: Option<BTreeMap<String, MemberEntry>>,
    state: TransactionState,
}

impl Registry {
    fn members(&mut self) -> &mut BTreeMap<String, MemberEntry> {
        self.members.get_or_insert_with(BTreeMap::new)
    }

    fn snapshot(&mut self) -> Vec<Arc<dyn TransactionMember>> {
        self.members()
            .values()
            .map(|entry| Arc::clone(&entry.member))
            .collect()
    }

    fn advance(&mut self, to: TransactionState) -> bool {
        if self.state.can_transition_to(to) {
            self.state = to;
            true
        } else {
            false
        }
    }
}

/// Per-job transaction.
///
/// Owned by exactly one job execution. The member registry is guarded by a
/// single lock; member callbacks always run outside of it, on a snapshot.
pub struct Transaction {
    id: TransactionId,
    registry: Mutex<Registry>,
    failures: Mutex<Vec<TransactionFailure>>,
    cancelled: AtomicBool,
}

impl Transaction {
    pub fn new(id: impl Into<TransactionId>) -> Self {
        Self {
            id: id.into(),
            registry: Mutex::new(Registry {
                members: None,
                state: TransactionState::Active,
            }),
            failures: Mutex::new(Vec::new()),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn begin(ids: &dyn IdProvider) -> Arc<Self> {
        let tx = Arc::new(Self::new(ids.generate_id()));
        debug!(transaction_id = %tx.id, "Transaction started");
        tx
    }

    /// Transaction of the job running on this thread
    pub fn current() -> Option<Arc<Transaction>> {
        TRANSACTION.get()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> TransactionState {
        self.lock().state
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_failures(&self) -> MutexGuard<'_, Vec<TransactionFailure>> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_open(&self, registry: &Registry) -> Result<()> {
        if self.is_cancelled() {
            return Err(JobError::Cancelled(format!(
                "transaction {} was cancelled",
                self.id
            )));
        }
        if registry.state == TransactionState::Released {
            return Err(JobError::InvalidState(format!(
                "transaction {} is already released",
                self.id
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Member registry
    // ------------------------------------------------------------------

    /// Register a member under its id.
    ///
    /// A member already registered under the same id is released first and
    /// then replaced.
    pub fn register<M: TransactionMember + 'static>(&self, member: Arc<M>) -> Result<()> {
        let member_id = member.member_id().to_string();

        let previous = {
            let mut registry = self.lock();
            self.ensure_open(&registry)?;
            registry.members().remove(&member_id)
        };
        if let Some(previous) = previous {
            self.evict(&member_id, previous);
        }

        let displaced = {
            let mut registry = self.lock();
            self.ensure_open(&registry)?;
            registry
                .members()
                .insert(member_id.clone(), MemberEntry::new(member))
        };
        // a concurrent registration slipped in between the two locks
        if let Some(displaced) = displaced {
            self.evict(&member_id, displaced);
        }
        debug!(transaction_id = %self.id, member_id = %member_id, "Member registered");
        Ok(())
    }

    fn evict(&self, member_id: &str, entry: MemberEntry) {
        warn!(
            transaction_id = %self.id,
            member_id = %member_id,
            "Member id already registered; releasing the previous member"
        );
        self.release_member(&entry.member);
    }

    /// Return the member registered under `member_id`, creating and
    /// registering it with `factory` if absent.
    ///
    /// The factory runs under the registry lock and must not call back into
    /// this transaction.
    pub fn register_member_if_absent<M, F>(&self, member_id: &str, factory: F) -> Result<Arc<M>>
    where
        M: TransactionMember + 'static,
        F: FnOnce(&str) -> std::result::Result<M, ProcessingError>,
    {
        let mut registry = self.lock();
        self.ensure_open(&registry)?;

        if let Some(entry) = registry.members().get(member_id) {
            return Arc::clone(&entry.typed).downcast::<M>().map_err(|_| {
                JobError::InvalidState(format!(
                    "member {} is registered with a different type",
                    member_id
                ))
            });
        }

        let member = Arc::new(factory(member_id)?);
        registry.members().insert(
            member_id.to_string(),
            MemberEntry::new(Arc::clone(&member)),
        );
        debug!(transaction_id = %self.id, member_id = %member_id, "Member created and registered");
        Ok(member)
    }

    /// Like `register_member_if_absent`, but answers `None` without invoking
    /// the factory when the transaction was cancelled.
    pub fn register_member_if_absent_and_not_cancelled<M, F>(
        &self,
        member_id: &str,
        factory: F,
    ) -> Result<Option<Arc<M>>>
    where
        M: TransactionMember + 'static,
        F: FnOnce(&str) -> std::result::Result<M, ProcessingError>,
    {
        if self.is_cancelled() {
            return Ok(None);
        }
        match self.register_member_if_absent(member_id, factory) {
            Ok(member) => Ok(Some(member)),
            Err(JobError::Cancelled(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn get_member(&self, member_id: &str) -> Option<Arc<dyn TransactionMember>> {
        self.lock()
            .members()
            .get(member_id)
            .map(|entry| Arc::clone(&entry.member))
    }

    /// Typed access to a registered member
    pub fn get_member_as<M: TransactionMember + 'static>(&self, member_id: &str) -> Option<Arc<M>> {
        self.lock()
            .members()
            .get(member_id)
            .and_then(|entry| Arc::clone(&entry.typed).downcast::<M>().ok())
    }

    /// Snapshot of the registered members (a copy, not a live view)
    pub fn members(&self) -> Vec<Arc<dyn TransactionMember>> {
        self.lock().snapshot()
    }

    /// Remove `member` only if it is the very instance stored under its id
    pub fn unregister<M: TransactionMember + ?Sized>(&self, member: &Arc<M>) -> bool {
        let wanted = Arc::as_ptr(member).cast::<()>();
        let mut registry = self.lock();
        let members = registry.members();
        let same = members
            .get(member.member_id())
            .is_some_and(|entry| Arc::as_ptr(&entry.member).cast::<()>() == wanted);
        if same {
            members.remove(member.member_id());
        }
        same
    }

    // ------------------------------------------------------------------
    // Failures
    // ------------------------------------------------------------------

    /// Record a failure detected outside the member protocol. Vetoes the commit.
    pub fn add_failure(&self, failure: impl Into<BoxError>) {
        let failure: TransactionFailure = Arc::from(failure.into());
        debug!(transaction_id = %self.id, failure = %failure, "Failure recorded");
        self.lock_failures().push(failure);
    }

    pub fn has_failures(&self) -> bool {
        !self.lock_failures().is_empty()
    }

    pub fn failures(&self) -> Vec<TransactionFailure> {
        self.lock_failures().clone()
    }

    // ------------------------------------------------------------------
    // Two-phase protocol
    // ------------------------------------------------------------------

    /// Prepare every member needing a commit.
    ///
    /// Returns true only if every touched member answered `true`, no failure
    /// was recorded and the transaction was not cancelled.
    pub fn commit_phase1(&self) -> bool {
        let members = {
            let mut registry = self.lock();
            if registry.state != TransactionState::Active {
                warn!(
                    transaction_id = %self.id,
                    state = %registry.state,
                    "Commit phase 1 requested outside of the active state"
                );
                return false;
            }
            registry.snapshot()
        };

        if self.is_cancelled() {
            info!(transaction_id = %self.id, "Transaction cancelled; vetoing commit");
            self.lock().advance(TransactionState::RollingBack);
            return false;
        }

        let mut prepared = true;
        for member in &members {
            if !self.member_needs_commit(member) {
                continue;
            }
            match execute_guarded(|| member.commit_phase1()).into_result() {
                Ok(Ok(true)) => {}
                Ok(Ok(false)) => {
                    warn!(
                        transaction_id = %self.id,
                        member_id = %member.member_id(),
                        "Member vetoed commit phase 1"
                    );
                    prepared = false;
                }
                Ok(Err(e)) => {
                    error!(
                        transaction_id = %self.id,
                        member_id = %member.member_id(),
                        error = %e,
                        "Commit phase 1 failed"
                    );
                    self.add_failure(e);
                    prepared = false;
                }
                Err(panic_msg) => {
                    error!(
                        transaction_id = %self.id,
                        member_id = %member.member_id(),
                        panic_msg = %panic_msg,
                        "Commit phase 1 panicked"
                    );
                    prepared = false;
                }
            }
        }

        let success = prepared && !self.has_failures();
        let next = if success {
            TransactionState::Committing
        } else {
            TransactionState::RollingBack
        };
        self.lock().advance(next);
        success
    }

    /// Confirm the commit on every member needing it. Best effort: member
    /// failures are logged and never propagated.
    pub fn commit_phase2(&self) {
        let members = {
            let mut registry = self.lock();
            if registry.state != TransactionState::Committing {
                error!(
                    transaction_id = %self.id,
                    state = %registry.state,
                    "Commit phase 2 requested without a successful phase 1; skipping"
                );
                return;
            }
            registry.snapshot()
        };

        for member in &members {
            if self.member_needs_commit(member) {
                self.contain(member, "commit phase 2", || member.commit_phase2());
            }
        }
        self.lock().advance(TransactionState::Committed);
        debug!(transaction_id = %self.id, "Transaction committed");
    }

    /// Roll back every member needing it. Member failures are logged and
    /// never propagated.
    pub fn rollback(&self) {
        let members = {
            let mut registry = self.lock();
            if registry.state != TransactionState::RollingBack
                && !registry.advance(TransactionState::RollingBack)
            {
                warn!(
                    transaction_id = %self.id,
                    state = %registry.state,
                    "Rollback requested in a final state; skipping"
                );
                return;
            }
            registry.snapshot()
        };

        for member in &members {
            if self.member_needs_commit(member) {
                self.contain(member, "rollback", || member.rollback());
            }
        }
        self.lock().advance(TransactionState::RolledBack);
        debug!(transaction_id = %self.id, "Transaction rolled back");
    }

    /// Clear the registry and release every member. Runs at most once.
    pub fn release(&self) {
        let members: Vec<Arc<dyn TransactionMember>> = {
            let mut registry = self.lock();
            if registry.state == TransactionState::Released {
                debug!(transaction_id = %self.id, "Transaction already released");
                return;
            }
            registry.state = TransactionState::Released;
            registry
                .members
                .take()
                .map(|members| members.into_values().map(|entry| entry.member).collect())
                .unwrap_or_default()
        };

        for member in &members {
            self.release_member(member);
        }
        debug!(transaction_id = %self.id, members = members.len(), "Transaction released");
    }

    fn release_member(&self, member: &Arc<dyn TransactionMember>) {
        if let Err(panic_msg) = execute_guarded(|| member.release()).into_result() {
            error!(
                transaction_id = %self.id,
                member_id = %member.member_id(),
                panic_msg = %panic_msg,
                "Member release panicked"
            );
        }
    }

    // ------------------------------------------------------------------
    // Cancellation
    // ------------------------------------------------------------------

    /// Mark the transaction cancelled and ask every member to cancel.
    ///
    /// Returns false if it was already cancelled or any member failed to
    /// cancel. Never panics.
    pub fn cancel(&self, interrupt: bool) -> bool {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }
        info!(transaction_id = %self.id, interrupt, "Cancelling transaction");

        let members = self.members();
        let mut all_cancelled = true;
        for member in &members {
            if !self.contain(member, "cancel", || member.cancel()) {
                all_cancelled = false;
            }
        }
        all_cancelled
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn member_needs_commit(&self, member: &Arc<dyn TransactionMember>) -> bool {
        match execute_guarded(|| member.needs_commit()).into_result() {
            Ok(needs_commit) => needs_commit,
            Err(panic_msg) => {
                error!(
                    transaction_id = %self.id,
                    member_id = %member.member_id(),
                    panic_msg = %panic_msg,
                    "needs_commit panicked; treating member as participating"
                );
                true
            }
        }
    }

    /// Run a member call, logging errors and panics. Returns true on success.
    fn contain<F>(&self, member: &Arc<dyn TransactionMember>, operation: &str, f: F) -> bool
    where
        F: FnOnce() -> std::result::Result<(), ProcessingError>,
    {
        match execute_guarded(f).into_result() {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!(
                    transaction_id = %self.id,
                    member_id = %member.member_id(),
                    operation,
                    error = %e,
                    "Member call failed"
                );
                false
            }
            Err(panic_msg) => {
                error!(
                    transaction_id = %self.id,
                    member_id = %member.member_id(),
                    operation,
                    panic_msg = %panic_msg,
                    "Member call panicked"
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::transaction_member::mocks::{
        MemberCall, MemberCallKind, MockBehavior, RecordingMember,
    };

    fn shared_journal() -> Arc<Mutex<Vec<(String, MemberCall)>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[test]
    fn test_phase1_touches_only_members_needing_commit() {
        let journal = shared_journal();
        let tx = Transaction::new("tx-1");
        let dirty = Arc::new(RecordingMember::with_journal("dirty", true, journal.clone()));
        let clean = Arc::new(RecordingMember::with_journal("clean", false, journal.clone()));
        tx.register(dirty.clone()).unwrap();
        tx.register(clean.clone()).unwrap();

        assert!(tx.commit_phase1());
        assert_eq!(dirty.calls(), vec![MemberCall::CommitPhase1]);
        assert!(clean.calls().is_empty());
        assert_eq!(tx.state(), TransactionState::Committing);
    }

    #[test]
    fn test_full_commit_sequence() {
        let tx = Transaction::new("tx-1");
        let member = Arc::new(RecordingMember::new("m", true));
        tx.register(member.clone()).unwrap();

        assert!(tx.commit_phase1());
        tx.commit_phase2();
        tx.release();

        assert_eq!(
            member.calls(),
            vec![
                MemberCall::CommitPhase1,
                MemberCall::CommitPhase2,
                MemberCall::Release
            ]
        );
        assert_eq!(tx.state(), TransactionState::Released);
        assert!(tx.members().is_empty());
    }

    #[test]
    fn test_veto_forces_rollback_and_blocks_phase2() {
        let journal = shared_journal();
        let tx = Transaction::new("tx-1");
        let ok = Arc::new(RecordingMember::with_journal("a-ok", true, journal.clone()));
        let veto = Arc::new(
            RecordingMember::with_journal("b-veto", true, journal.clone())
                .behaving(MockBehavior::Veto),
        );
        tx.register(ok.clone()).unwrap();
        tx.register(veto.clone()).unwrap();

        assert!(!tx.commit_phase1());
        tx.commit_phase2(); // must be ignored
        tx.rollback();
        tx.release();

        for member in [&ok, &veto] {
            assert_eq!(member.count(MemberCall::CommitPhase2), 0);
            assert_eq!(member.count(MemberCall::Rollback), 1);
            assert_eq!(member.count(MemberCall::Release), 1);
        }
        assert_eq!(tx.state(), TransactionState::Released);
    }

    #[test]
    fn test_recorded_failure_vetoes_commit() {
        let tx = Transaction::new("tx-1");
        let member = Arc::new(RecordingMember::new("m", true));
        tx.register(member.clone()).unwrap();
        tx.add_failure("work failed");

        assert!(!tx.commit_phase1());
        assert!(tx.has_failures());
        assert_eq!(tx.failures()[0].to_string(), "work failed");
        assert_eq!(tx.state(), TransactionState::RollingBack);
    }

    #[test]
    fn test_phase1_error_and_panic_are_contained() {
        let tx = Transaction::new("tx-1");
        let failing = Arc::new(
            RecordingMember::new("failing", true)
                .behaving(MockBehavior::Fail(MemberCallKind::CommitPhase1)),
        );
        tx.register(failing.clone()).unwrap();
        assert!(!tx.commit_phase1());

        let tx = Transaction::new("tx-2");
        let panicking = Arc::new(
            RecordingMember::new("panicking", true)
                .behaving(MockBehavior::Panic(MemberCallKind::CommitPhase1)),
        );
        tx.register(panicking.clone()).unwrap();
        assert!(!tx.commit_phase1());
        tx.rollback();
        tx.release();
        assert_eq!(panicking.count(MemberCall::Rollback), 1);
        assert_eq!(panicking.count(MemberCall::Release), 1);
    }

    #[test]
    fn test_phase2_failure_does_not_stop_other_members() {
        for behavior in [
            MockBehavior::Fail(MemberCallKind::CommitPhase2),
            MockBehavior::Panic(MemberCallKind::CommitPhase2),
        ] {
            let journal = shared_journal();
            let tx = Transaction::new("tx-1");
            let broken = Arc::new(
                RecordingMember::with_journal("a-broken", true, journal.clone()).behaving(behavior),
            );
            let healthy = Arc::new(RecordingMember::with_journal("b-healthy", true, journal.clone()));
            tx.register(broken.clone()).unwrap();
            tx.register(healthy.clone()).unwrap();

            assert!(tx.commit_phase1());
            tx.commit_phase2();
            tx.release();

            assert_eq!(healthy.count(MemberCall::CommitPhase2), 1);
            for member in [&broken, &healthy] {
                assert_eq!(member.count(MemberCall::Rollback), 0);
                assert_eq!(member.count(MemberCall::Release), 1);
            }
            assert_eq!(tx.state(), TransactionState::Released);
        }
    }

    #[test]
    fn test_release_runs_once_even_after_failures() {
        let tx = Transaction::new("tx-1");
        let member = Arc::new(
            RecordingMember::new("m", true)
                .behaving(MockBehavior::Panic(MemberCallKind::Rollback)),
        );
        tx.register(member.clone()).unwrap();

        tx.add_failure("boom");
        assert!(!tx.commit_phase1());
        tx.rollback();
        tx.release();
        tx.release();

        assert_eq!(member.count(MemberCall::Release), 1);
    }

    #[test]
    fn test_release_panic_does_not_escape() {
        let tx = Transaction::new("tx-1");
        let member = Arc::new(
            RecordingMember::new("m", false).behaving(MockBehavior::Panic(MemberCallKind::Release)),
        );
        let other = Arc::new(RecordingMember::new("other", false));
        tx.register(member.clone()).unwrap();
        tx.register(other.clone()).unwrap();

        tx.release();
        assert_eq!(member.count(MemberCall::Release), 1);
        assert_eq!(other.count(MemberCall::Release), 1);
    }

    #[test]
    fn test_reregistering_releases_previous_member_first() {
        let journal = shared_journal();
        let tx = Transaction::new("tx-1");
        let first = Arc::new(RecordingMember::with_journal("same", true, journal.clone()));
        let second = Arc::new(RecordingMember::with_journal("same", true, journal.clone()));

        tx.register(first.clone()).unwrap();
        tx.register(second.clone()).unwrap();

        assert_eq!(
            journal.lock().unwrap().clone(),
            vec![("same".to_string(), MemberCall::Release)]
        );
        let stored = tx.get_member("same").unwrap();
        assert_eq!(
            Arc::as_ptr(&stored).cast::<()>(),
            Arc::as_ptr(&second).cast::<()>()
        );
        assert_eq!(tx.members().len(), 1);
    }

    #[test]
    fn test_unregister_requires_identity() {
        let tx = Transaction::new("tx-1");
        let stale = Arc::new(RecordingMember::new("m", true));
        let current = Arc::new(RecordingMember::new("m", true));
        tx.register(stale.clone()).unwrap();
        tx.register(current.clone()).unwrap();

        assert!(!tx.unregister(&stale));
        assert!(tx.get_member("m").is_some());
        assert!(tx.unregister(&current));
        assert!(tx.get_member("m").is_none());
    }

    #[test]
    fn test_members_returns_snapshot() {
        let tx = Transaction::new("tx-1");
        tx.register(Arc::new(RecordingMember::new("a", true))).unwrap();
        let snapshot = tx.members();
        tx.register(Arc::new(RecordingMember::new("b", true))).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(tx.members().len(), 2);
    }

    #[test]
    fn test_register_member_if_absent_reuses_existing() {
        let tx = Transaction::new("tx-1");
        let first = tx
            .register_member_if_absent("m", |id| Ok(RecordingMember::new(id, true)))
            .unwrap();
        let again = tx
            .register_member_if_absent::<RecordingMember, _>("m", |_| {
                panic!("factory must not run for a present member")
            })
            .unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert!(tx.get_member_as::<RecordingMember>("m").is_some());
    }

    #[test]
    fn test_register_member_if_absent_propagates_factory_error() {
        let tx = Transaction::new("tx-1");
        let result = tx.register_member_if_absent::<RecordingMember, _>("m", |_| {
            Err(ProcessingError::new("cannot open session"))
        });
        assert!(matches!(result, Err(JobError::Processing(_))));
        assert!(tx.get_member("m").is_none());
    }

    #[test]
    fn test_cancelled_transaction_refuses_members() {
        let tx = Transaction::new("tx-1");
        assert!(tx.cancel(false));
        assert!(!tx.cancel(false));

        let absent = tx
            .register_member_if_absent_and_not_cancelled::<RecordingMember, _>("m", |_| {
                panic!("factory must not run on a cancelled transaction")
            })
            .unwrap();
        assert!(absent.is_none());
        assert!(matches!(
            tx.register_member_if_absent("m", |id| Ok(RecordingMember::new(id, true))),
            Err(JobError::Cancelled(_))
        ));
        assert!(matches!(
            tx.register(Arc::new(RecordingMember::new("m", true))),
            Err(JobError::Cancelled(_))
        ));
    }

    #[test]
    fn test_cancel_reaches_members_and_vetoes_commit() {
        let tx = Transaction::new("tx-1");
        let member = Arc::new(RecordingMember::new("m", true));
        tx.register(member.clone()).unwrap();

        assert!(tx.cancel(true));
        assert_eq!(member.count(MemberCall::Cancel), 1);
        assert!(!tx.commit_phase1());
        assert_eq!(member.count(MemberCall::CommitPhase1), 0);
    }

    #[test]
    fn test_cancel_reports_member_failure() {
        let tx = Transaction::new("tx-1");
        tx.register(Arc::new(
            RecordingMember::new("m", true).behaving(MockBehavior::Fail(MemberCallKind::Cancel)),
        ))
        .unwrap();
        assert!(!tx.cancel(true));
        assert!(tx.is_cancelled());
    }

    #[test]
    fn test_released_transaction_is_not_reused() {
        let tx = Transaction::new("tx-1");
        tx.release();
        assert!(matches!(
            tx.register(Arc::new(RecordingMember::new("m", true))),
            Err(JobError::InvalidState(_))
        ));
        assert!(!tx.commit_phase1());
    }

    #[test]
    fn test_current_reads_ambient_transaction() {
        assert!(Transaction::current().is_none());
        let tx = Arc::new(Transaction::new("tx-1"));
        TRANSACTION.scoped(Some(tx.clone()), || {
            assert_eq!(Transaction::current().unwrap().id(), "tx-1");
        });
        assert!(Transaction::current().is_none());
    }
}
