//! Cancellation cascading from job handles into transactions and members

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use conduit_core::domain::{ExecutionIdentity, JobInput, JobState};
use conduit_core::port::transaction_member::mocks::{MemberCall, RecordingMember};
use conduit_core::port::{Destination, MessageConnection, TransactionMember};
use conduit_core::{
    BoxError, JobContext, JobError, JobManager, JobManagerConfig, ProcessingError, Transaction,
};
use conduit_infra_messaging::{InMemoryBroker, TransactionalMessaging};

fn manager(workers: usize) -> JobManager {
    JobManager::new(JobManagerConfig::default().with_worker_threads(workers)).unwrap()
}

fn identity() -> ExecutionIdentity {
    ExecutionIdentity::new("session-9", "carol")
}

fn input(job_id: u64) -> JobInput {
    JobInput::new(job_id).with_identity(identity())
}

fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Cancelling a job blocked in an unbounded receive closes the member's
/// session, which wakes the receive; nothing is committed.
#[test]
fn test_cancel_unblocks_pending_receive() {
    let manager = manager(2);
    let broker = InMemoryBroker::new();
    let connection: Arc<dyn MessageConnection> = broker.connect();
    let messaging = TransactionalMessaging::<String>::json(connection);
    let queue = Destination::new("never-filled");

    let woke_up = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&woke_up);
    let (m, q) = (messaging.clone(), queue.clone());
    let handle = manager
        .submit(
            move || -> Result<Option<String>, BoxError> {
                let result = m.receive(&q, -1);
                flag.store(true, Ordering::SeqCst);
                Ok(result?)
            },
            input(1),
        )
        .unwrap();

    wait_until("session to open", || broker.session_stats().len() == 1);
    assert!(handle.cancel(true));

    let err = handle.join_blocking().unwrap_err();
    assert!(matches!(err, JobError::Cancelled(_)));
    wait_until("receive to return", || woke_up.load(Ordering::SeqCst));

    let stats = broker.session_stats();
    assert!(stats[0].is_closed());
    assert_eq!(stats[0].commits(), 0);
}

/// Transactions registered on the handle are cancelled before the job is
#[test]
fn test_handle_cancel_reaches_registered_transaction() {
    let manager = manager(1);
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let handle = manager
        .submit(
            move || release_rx.recv().map_err(|e| Box::new(e) as BoxError),
            input(2),
        )
        .unwrap();

    let extra = Arc::new(Transaction::new("side-tx"));
    let member = Arc::new(RecordingMember::new("side-member", true));
    extra.register(Arc::clone(&member)).unwrap();
    handle.register_transaction(Arc::clone(&extra));

    assert!(handle.cancel(false));
    assert!(extra.is_cancelled());
    assert_eq!(member.calls(), vec![MemberCall::Cancel]);

    let _ = release_tx.send(());
    assert!(handle.join_blocking().unwrap_err().is_cancelled());
}

/// Side member whose cancellation takes a while
struct SlowCancelMember;

impl TransactionMember for SlowCancelMember {
    fn member_id(&self) -> &str {
        "slow-cancel"
    }

    fn needs_commit(&self) -> bool {
        false
    }

    fn commit_phase1(&self) -> Result<bool, ProcessingError> {
        Ok(true)
    }

    fn commit_phase2(&self) -> Result<(), ProcessingError> {
        Ok(())
    }

    fn rollback(&self) -> Result<(), ProcessingError> {
        Ok(())
    }

    fn release(&self) {}

    fn cancel(&self) -> Result<(), ProcessingError> {
        std::thread::sleep(Duration::from_millis(300));
        Ok(())
    }
}

/// Work that writes as soon as it sees the cancellation must not commit,
/// however long the other registered transactions take to cancel
#[test]
fn test_work_reacting_to_cancel_cannot_commit() {
    for round in 0..4 {
        let manager = manager(1);
        let broker = InMemoryBroker::new();
        let connection: Arc<dyn MessageConnection> = broker.connect();
        let messaging = TransactionalMessaging::<String>::json(connection);
        let queue = Destination::new("late-writes");

        let started = Arc::new(AtomicBool::new(false));
        let (m, q, flag) = (messaging.clone(), queue.clone(), Arc::clone(&started));
        let handle = manager
            .submit(
                move || -> Result<(), BoxError> {
                    let job = JobContext::current().ok_or("not in a job")?;
                    flag.store(true, Ordering::SeqCst);
                    while !job.is_cancelled() {
                        std::thread::sleep(Duration::from_millis(1));
                    }
                    m.publish(&q, &"written after cancel".to_string())?;
                    Ok(())
                },
                input(20 + round),
            )
            .unwrap();

        wait_until("job to start", || started.load(Ordering::SeqCst));
        let side = Arc::new(Transaction::new(format!("side-tx-{}", round)));
        side.register(Arc::new(SlowCancelMember)).unwrap();
        handle.register_transaction(side);

        assert!(handle.cancel(true));
        assert!(handle.join_blocking().unwrap_err().is_cancelled());
        wait_until("job to leave the pool", || manager.active_jobs().is_empty());

        assert_eq!(broker.queue_depth(&queue), 0, "round {}", round);
        assert!(broker.session_stats().iter().all(|s| s.commits() == 0));
    }
}

#[test]
fn test_cancel_before_start_prevents_execution() {
    let manager = manager(1);
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let blocker = manager
        .submit(
            move || release_rx.recv().map_err(|e| Box::new(e) as BoxError),
            input(3),
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
            input(4),
        )
        .unwrap();

    assert_eq!(queued.state(), JobState::Scheduled);
    assert!(queued.cancel(true));
    assert!(queued.is_cancelled());

    release_tx.send(()).unwrap();
    blocker.join_blocking().unwrap();
    assert!(queued.join_blocking().unwrap_err().is_cancelled());
    assert!(!ran.load(Ordering::SeqCst));
}

#[test]
fn test_cancel_after_done_is_noop() {
    let manager = manager(1);
    let member = Arc::new(RecordingMember::new("m", true));
    let registered = Arc::clone(&member);
    let handle = manager
        .submit(
            move || -> Result<(), BoxError> {
                Transaction::current()
                    .ok_or("no transaction")?
                    .register(registered)?;
                Ok(())
            },
            input(5),
        )
        .unwrap();

    wait_until("job to finish", || handle.is_done());
    assert!(!handle.cancel(true));
    assert!(!handle.cancel(true));
    assert_eq!(handle.state(), JobState::Done);
    assert_eq!(member.count(MemberCall::Release), 1);
    assert_eq!(member.count(MemberCall::Cancel), 0);
    handle.join_blocking().unwrap();
}

/// Cancel by id only matches the submitting identity
#[tokio::test]
async fn test_manager_cancel_by_id_and_identity() {
    let manager = manager(2);
    let handle = manager
        .submit(
            || -> Result<bool, BoxError> {
                let job = JobContext::current().ok_or("not in a job")?;
                let token = job.interrupt_token();
                while !token.is_cancelled() {
                    std::thread::sleep(Duration::from_millis(5));
                }
                Ok(job.is_cancelled())
            },
            input(6),
        )
        .unwrap();

    assert!(!manager.cancel(6, &ExecutionIdentity::new("session-9", "mallory")));
    assert!(!manager.cancel(99, &identity()));
    assert!(manager.cancel(6, &identity()));

    let err = handle.join().await.unwrap_err();
    assert!(err.is_cancelled());
}

#[test]
fn test_shutdown_cancels_active_jobs() {
    let manager = manager(1);
    let handle = manager
        .submit(
            || -> Result<(), BoxError> {
                let job = JobContext::current().ok_or("not in a job")?;
                while !job.is_interrupted() {
                    std::thread::sleep(Duration::from_millis(5));
                }
                Ok(())
            },
            input(7),
        )
        .unwrap();

    wait_until("job to start", || handle.state() == JobState::Running);
    manager.shutdown();

    assert!(handle.is_cancelled());
    assert!(handle.join_blocking().unwrap_err().is_cancelled());
    assert!(manager.submit(|| Ok::<_, BoxError>(()), input(8)).is_err());
}
