// In-memory message transport
// Named queues shared by every connection of one broker

mod session;

pub use session::{InMemoryConnection, InMemoryConsumer, InMemoryProducer, InMemorySession};

use conduit_core::port::{Destination, RawMessage};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Broker holding named FIFO queues. Cloning yields another handle to the
/// same queues.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    inner: Arc<BrokerInner>,
}

#[derive(Default)]
pub(crate) struct BrokerInner {
    queues: Mutex<HashMap<String, VecDeque<RawMessage>>>,
    available: Condvar,
    next_connection: AtomicU64,
    sessions: Mutex<Vec<Arc<SessionStats>>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new connection. Each connection has its own id.
    pub fn connect(&self) -> Arc<InMemoryConnection> {
        let n = self.inner.next_connection.fetch_add(1, Ordering::Relaxed) + 1;
        Arc::new(InMemoryConnection::new(
            format!("memory-{}", n),
            Arc::clone(&self.inner),
        ))
    }

    /// Enqueue a message directly, bypassing any session
    pub fn publish(&self, destination: &Destination, message: RawMessage) {
        self.inner.enqueue(destination.name(), vec![message]);
    }

    /// Messages waiting on a queue (delivered but uncommitted ones excluded)
    pub fn queue_depth(&self, destination: &Destination) -> usize {
        self.inner
            .lock_queues()
            .get(destination.name())
            .map_or(0, VecDeque::len)
    }

    /// Statistics of every session opened so far, in creation order
    pub fn session_stats(&self) -> Vec<SessionStats> {
        self.inner
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|stats| stats.snapshot())
            .collect()
    }
}

impl BrokerInner {
    pub(crate) fn lock_queues(&self) -> MutexGuard<'_, HashMap<String, VecDeque<RawMessage>>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn enqueue(&self, queue: &str, messages: Vec<RawMessage>) {
        if messages.is_empty() {
            return;
        }
        self.lock_queues()
            .entry(queue.to_string())
            .or_default()
            .extend(messages);
        self.available.notify_all();
    }

    /// Put messages back at the head of their queues, keeping their order
    pub(crate) fn redeliver(&self, messages: Vec<(String, RawMessage)>) {
        if messages.is_empty() {
            return;
        }
        let mut queues = self.lock_queues();
        for (queue, message) in messages.into_iter().rev() {
            queues.entry(queue).or_default().push_front(message);
        }
        drop(queues);
        self.available.notify_all();
    }

    pub(crate) fn track(&self, stats: Arc<SessionStats>) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(stats);
    }
}

/// Per-session counters
#[derive(Debug, Default)]
pub struct SessionStats {
    pub connection_id: String,
    pub transacted: bool,
    commits: AtomicU64,
    rollbacks: AtomicU64,
    closed: AtomicBool,
}

impl SessionStats {
    pub(crate) fn new(connection_id: &str, transacted: bool) -> Self {
        Self {
            connection_id: connection_id.to_string(),
            transacted,
            ..Default::default()
        }
    }

    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> u64 {
        self.rollbacks.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn record_commit(&self) {
        self.commits.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_rollback(&self) {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn snapshot(&self) -> SessionStats {
        SessionStats {
            connection_id: self.connection_id.clone(),
            transacted: self.transacted,
            commits: AtomicU64::new(self.commits()),
            rollbacks: AtomicU64::new(self.rollbacks()),
            closed: AtomicBool::new(self.is_closed()),
        }
    }
}
