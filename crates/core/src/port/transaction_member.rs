// Transaction Member Port
// Contract each external resource implements to take part in a transaction

use crate::error::ProcessingError;

/// A resource participating in a transaction's two-phase protocol.
///
/// Members are shared (`Arc`) between the transaction and the code using the
/// resource, so every operation takes `&self`.
pub trait TransactionMember: Send + Sync {
    /// Key into the transaction's member registry
    fn member_id(&self) -> &str;

    /// Whether any mutating operation happened since creation.
    /// Gates `commit_phase1`, `commit_phase2` and `rollback`.
    fn needs_commit(&self) -> bool;

    /// Prepare. Returning `Ok(false)` vetoes the commit.
    fn commit_phase1(&self) -> Result<bool, ProcessingError>;

    /// Confirm the commit. Only invoked once phase 1 succeeded everywhere.
    fn commit_phase2(&self) -> Result<(), ProcessingError>;

    fn rollback(&self) -> Result<(), ProcessingError>;

    /// Free the resource. Must not fail and must leave shared resources
    /// (e.g. a connection used by other transactions) open.
    fn release(&self);

    /// Unblock in-progress work tied to the transaction. Defaults to a no-op.
    fn cancel(&self) -> Result<(), ProcessingError> {
        Ok(())
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Lifecycle call observed on a recording member
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum MemberCall {
        CommitPhase1,
        CommitPhase2,
        Rollback,
        Release,
        Cancel,
    }

    /// How a recording member reacts to a lifecycle call
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub enum MockBehavior {
        #[default]
        Succeed,
        /// Phase 1 answers `Ok(false)`
        Veto,
        /// Return an error from the given call
        Fail(MemberCallKind),
        /// Panic inside the given call
        Panic(MemberCallKind),
    }

    /// Which call a failing behavior applies to
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum MemberCallKind {
        CommitPhase1,
        CommitPhase2,
        Rollback,
        Release,
        Cancel,
    }

    /// Member that records every lifecycle call into a shared journal
    pub struct RecordingMember {
        id: String,
        needs_commit: bool,
        behavior: MockBehavior,
        journal: Arc<Mutex<Vec<(String, MemberCall)>>>,
    }

    impl RecordingMember {
        pub fn new(id: impl Into<String>, needs_commit: bool) -> Self {
            Self::with_journal(id, needs_commit, Arc::new(Mutex::new(Vec::new())))
        }

        /// Several members can share one journal to observe cross-member ordering
        pub fn with_journal(
            id: impl Into<String>,
            needs_commit: bool,
            journal: Arc<Mutex<Vec<(String, MemberCall)>>>,
        ) -> Self {
            Self {
                id: id.into(),
                needs_commit,
                behavior: MockBehavior::Succeed,
                journal,
            }
        }

        pub fn behaving(mut self, behavior: MockBehavior) -> Self {
            self.behavior = behavior;
            self
        }

        pub fn journal(&self) -> Arc<Mutex<Vec<(String, MemberCall)>>> {
            Arc::clone(&self.journal)
        }

        /// Calls recorded for this member only
        pub fn calls(&self) -> Vec<MemberCall> {
            self.journal
                .lock()
                .unwrap()
                .iter()
                .filter(|(id, _)| id == &self.id)
                .map(|(_, call)| *call)
                .collect()
        }

        pub fn count(&self, call: MemberCall) -> usize {
            self.calls().into_iter().filter(|c| *c == call).count()
        }

        fn record(&self, call: MemberCall, kind: MemberCallKind) -> Result<(), ProcessingError> {
            self.journal.lock().unwrap().push((self.id.clone(), call));
            match &self.behavior {
                MockBehavior::Fail(k) if *k == kind => Err(ProcessingError::new(format!(
                    "{} failed on {:?}",
                    self.id, kind
                ))),
                MockBehavior::Panic(k) if *k == kind => {
                    panic!("{} panicked on {:?}", self.id, kind)
                }
                _ => Ok(()),
            }
        }
    }

    impl TransactionMember for RecordingMember {
        fn member_id(&self) -> &str {
            &self.id
        }

        fn needs_commit(&self) -> bool {
            self.needs_commit
        }

        fn commit_phase1(&self) -> Result<bool, ProcessingError> {
            self.record(MemberCall::CommitPhase1, MemberCallKind::CommitPhase1)?;
            Ok(self.behavior != MockBehavior::Veto)
        }

        fn commit_phase2(&self) -> Result<(), ProcessingError> {
            self.record(MemberCall::CommitPhase2, MemberCallKind::CommitPhase2)
        }

        fn rollback(&self) -> Result<(), ProcessingError> {
            self.record(MemberCall::Rollback, MemberCallKind::Rollback)
        }

        fn release(&self) {
            // release has no error channel; only the panic behavior applies
            let _ = self.record(MemberCall::Release, MemberCallKind::Release);
        }

        fn cancel(&self) -> Result<(), ProcessingError> {
            self.record(MemberCall::Cancel, MemberCallKind::Cancel)
        }
    }
}
