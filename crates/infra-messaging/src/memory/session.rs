// In-memory connection, session, producer and consumer

use super::{BrokerInner, SessionStats};
use conduit_core::port::{
    Destination, MessageConnection, MessageConsumer, MessageProducer, MessageSession, RawMessage,
    ReceiveTimeout, TransportError,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::debug;

/// Connection to an `InMemoryBroker`, shareable by many sessions
pub struct InMemoryConnection {
    id: String,
    broker: Arc<BrokerInner>,
    closed: Arc<AtomicBool>,
}

impl InMemoryConnection {
    pub(crate) fn new(id: String, broker: Arc<BrokerInner>) -> Self {
        Self {
            id,
            broker,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Concrete session, for callers that need its statistics
    pub fn open_session(&self, transacted: bool) -> Result<InMemorySession, TransportError> {
        if self.is_closed() {
            return Err(TransportError::ConnectionClosed);
        }
        let stats = Arc::new(SessionStats::new(&self.id, transacted));
        self.broker.track(Arc::clone(&stats));
        debug!(connection_id = %self.id, transacted, "Session opened");
        Ok(InMemorySession {
            shared: Arc::new(SessionShared {
                broker: Arc::clone(&self.broker),
                connection_closed: Arc::clone(&self.closed),
                transacted,
                closed: AtomicBool::new(false),
                work: Mutex::new(SessionWork::default()),
                stats,
            }),
        })
    }
}

impl MessageConnection for InMemoryConnection {
    fn connection_id(&self) -> &str {
        &self.id
    }

    fn create_session(&self, transacted: bool) -> Result<Box<dyn MessageSession>, TransportError> {
        Ok(Box::new(self.open_session(transacted)?))
    }

    fn close(&self) -> Result<(), TransportError> {
        // hold the queue lock so a blocked receive cannot miss the wakeup
        let _queues = self.broker.lock_queues();
        self.closed.store(true, Ordering::SeqCst);
        self.broker.available.notify_all();
        Ok(())
    }
}

/// Uncommitted work of a transacted session
#[derive(Default)]
struct SessionWork {
    sends: Vec<(String, RawMessage)>,
    received: Vec<(String, RawMessage)>,
}

struct SessionShared {
    broker: Arc<BrokerInner>,
    connection_closed: Arc<AtomicBool>,
    transacted: bool,
    closed: AtomicBool,
    work: Mutex<SessionWork>,
    stats: Arc<SessionStats>,
}

impl SessionShared {
    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::SessionClosed);
        }
        if self.connection_closed.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }
        Ok(())
    }

    fn lock_work(&self) -> MutexGuard<'_, SessionWork> {
        self.work.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop pending sends and hand received messages back to their queues
    fn discard_work(&self) {
        let received = {
            let mut work = self.lock_work();
            work.sends.clear();
            std::mem::take(&mut work.received)
        };
        self.broker.redeliver(received);
    }
}

/// Session of an in-memory connection. Transacted sessions buffer sends
/// until commit and redeliver received messages on rollback or close.
pub struct InMemorySession {
    shared: Arc<SessionShared>,
}

impl InMemorySession {
    pub fn stats(&self) -> Arc<SessionStats> {
        Arc::clone(&self.shared.stats)
    }

    pub fn is_transacted(&self) -> bool {
        self.shared.transacted
    }
}

fn queue_name(destination: &Destination) -> Result<String, TransportError> {
    if destination.name().trim().is_empty() {
        return Err(TransportError::Destination(
            "destination name must not be empty".to_string(),
        ));
    }
    Ok(destination.name().to_string())
}

impl MessageSession for InMemorySession {
    fn create_producer(
        &self,
        destination: &Destination,
    ) -> Result<Box<dyn MessageProducer>, TransportError> {
        self.shared.ensure_open()?;
        Ok(Box::new(InMemoryProducer {
            session: Arc::clone(&self.shared),
            queue: queue_name(destination)?,
        }))
    }

    fn create_consumer(
        &self,
        destination: &Destination,
    ) -> Result<Box<dyn MessageConsumer>, TransportError> {
        self.shared.ensure_open()?;
        Ok(Box::new(InMemoryConsumer {
            session: Arc::clone(&self.shared),
            queue: queue_name(destination)?,
        }))
    }

    fn commit(&self) -> Result<(), TransportError> {
        self.shared.ensure_open()?;
        let sends = {
            let mut work = self.shared.lock_work();
            work.received.clear();
            std::mem::take(&mut work.sends)
        };
        for (queue, message) in sends {
            self.shared.broker.enqueue(&queue, vec![message]);
        }
        self.shared.stats.record_commit();
        Ok(())
    }

    fn rollback(&self) -> Result<(), TransportError> {
        self.shared.ensure_open()?;
        self.shared.discard_work();
        self.shared.stats.record_rollback();
        Ok(())
    }

    fn close(&self) -> Result<(), TransportError> {
        {
            let _queues = self.shared.broker.lock_queues();
            if self.shared.closed.swap(true, Ordering::SeqCst) {
                return Ok(());
            }
            self.shared.broker.available.notify_all();
        }
        self.shared.discard_work();
        self.shared.stats.record_close();
        debug!(connection_id = %self.shared.stats.connection_id, "Session closed");
        Ok(())
    }
}

pub struct InMemoryProducer {
    session: Arc<SessionShared>,
    queue: String,
}

impl MessageProducer for InMemoryProducer {
    fn send(&self, message: RawMessage) -> Result<(), TransportError> {
        self.session.ensure_open()?;
        if self.session.transacted {
            self.session
                .lock_work()
                .sends
                .push((self.queue.clone(), message));
        } else {
            self.session.broker.enqueue(&self.queue, vec![message]);
        }
        Ok(())
    }
}

pub struct InMemoryConsumer {
    session: Arc<SessionShared>,
    queue: String,
}

impl MessageConsumer for InMemoryConsumer {
    fn receive(&self, timeout: ReceiveTimeout) -> Result<Option<RawMessage>, TransportError> {
        let session = &self.session;
        let deadline = match timeout {
            ReceiveTimeout::Bounded(duration) => Some(Instant::now() + duration),
            _ => None,
        };

        let mut queues = session.broker.lock_queues();
        loop {
            session.ensure_open()?;
            if let Some(message) = queues.get_mut(&self.queue).and_then(|q| q.pop_front()) {
                // recorded under the queue lock: a concurrent close either
                // redelivers it or is seen by `ensure_open` above
                if session.transacted {
                    session
                        .lock_work()
                        .received
                        .push((self.queue.clone(), message.clone()));
                }
                return Ok(Some(message));
            }

            queues = match timeout {
                ReceiveTimeout::NoWait => return Ok(None),
                ReceiveTimeout::Unbounded => session
                    .broker
                    .available
                    .wait(queues)
                    .unwrap_or_else(PoisonError::into_inner),
                ReceiveTimeout::Bounded(_) => {
                    let now = Instant::now();
                    let Some(remaining) = deadline
                        .filter(|deadline| *deadline > now)
                        .map(|deadline| deadline - now)
                    else {
                        return Ok(None);
                    };
                    session
                        .broker
                        .available
                        .wait_timeout(queues, remaining)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }
}
