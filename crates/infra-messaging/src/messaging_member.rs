// Messaging session transaction member

use conduit_core::port::{
    Destination, MessageCodec, MessageConnection, MessageConsumer, MessageProducer,
    MessageSession, ReceiveTimeout, TransactionMember,
};
use conduit_core::ProcessingError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Transaction member owning one transacted session on a (possibly shared)
/// connection. The producer or consumer is created on first use.
///
/// `release` closes the session only; the connection stays open for the
/// other transactions using it.
pub struct MessagingMember<T> {
    member_id: String,
    destination: Destination,
    session: Box<dyn MessageSession>,
    codec: Arc<dyn MessageCodec<T>>,
    producer: Mutex<Option<Box<dyn MessageProducer>>>,
    consumer: Mutex<Option<Arc<dyn MessageConsumer>>>,
    needs_commit: AtomicBool,
    closed: AtomicBool,
}

impl<T> MessagingMember<T> {
    /// Member id used per connection and destination
    pub fn member_id_for(connection_id: &str, destination: &Destination) -> String {
        format!("messaging:{}:{}", connection_id, destination)
    }

    /// Open a transacted session on `connection`
    pub fn open(
        member_id: impl Into<String>,
        connection: &dyn MessageConnection,
        destination: Destination,
        codec: Arc<dyn MessageCodec<T>>,
    ) -> Result<Self, ProcessingError> {
        let session = connection.create_session(true)?;
        Ok(Self {
            member_id: member_id.into(),
            destination,
            session,
            codec,
            producer: Mutex::new(None),
            consumer: Mutex::new(None),
            needs_commit: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Encode `value` and hand it to the producer
    pub fn send(&self, value: &T) -> Result<(), ProcessingError> {
        self.needs_commit.store(true, Ordering::SeqCst);
        let message = self.codec.encode(value)?;

        let mut producer = lock(&self.producer);
        if producer.is_none() {
            *producer = Some(self.session.create_producer(&self.destination)?);
        }
        match producer.as_ref() {
            Some(producer) => producer.send(message).map_err(|e| {
                ProcessingError::from(e).with_context(format!("sending to {}", self.destination))
            }),
            None => Err(ProcessingError::new("producer unavailable")),
        }
    }

    /// Receive and decode one message. Positive timeout = bounded wait,
    /// zero = poll, negative = wait until a message arrives or the session
    /// is closed (e.g. by cancellation).
    pub fn receive(&self, timeout_millis: i64) -> Result<Option<T>, ProcessingError> {
        self.needs_commit.store(true, Ordering::SeqCst);
        let consumer = {
            let mut consumer = lock(&self.consumer);
            match consumer.as_ref() {
                Some(consumer) => Arc::clone(consumer),
                None => {
                    let created: Arc<dyn MessageConsumer> =
                        Arc::from(self.session.create_consumer(&self.destination)?);
                    *consumer = Some(Arc::clone(&created));
                    created
                }
            }
        };

        // blocking happens outside the lock
        let message = consumer
            .receive(ReceiveTimeout::from_millis(timeout_millis))
            .map_err(|e| {
                ProcessingError::from(e)
                    .with_context(format!("receiving from {}", self.destination))
            })?;
        message.map(|m| self.codec.decode(&m)).transpose()
    }

    fn close_session(&self) -> Result<(), ProcessingError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.session.close()?;
        debug!(member_id = %self.member_id, "Messaging session closed");
        Ok(())
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: 'static> TransactionMember for MessagingMember<T> {
    fn member_id(&self) -> &str {
        &self.member_id
    }

    fn needs_commit(&self) -> bool {
        self.needs_commit.load(Ordering::SeqCst)
    }

    /// No prepare primitive on a plain session
    fn commit_phase1(&self) -> Result<bool, ProcessingError> {
        Ok(true)
    }

    fn commit_phase2(&self) -> Result<(), ProcessingError> {
        self.session.commit()?;
        Ok(())
    }

    fn rollback(&self) -> Result<(), ProcessingError> {
        if self.closed.load(Ordering::SeqCst) {
            // closing already discarded the uncommitted work
            debug!(member_id = %self.member_id, "Session closed before rollback");
            return Ok(());
        }
        self.session.rollback()?;
        Ok(())
    }

    fn release(&self) {
        if let Err(e) = self.close_session() {
            warn!(member_id = %self.member_id, error = %e, "Failed to close messaging session");
        }
    }

    /// Closing the session wakes a receive blocked on it
    fn cancel(&self) -> Result<(), ProcessingError> {
        self.close_session()
    }
}
