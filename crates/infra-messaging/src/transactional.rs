// Transactional messaging facade
// Sends and receives enlisted in the transaction bound to the current thread

use crate::codec::JsonCodec;
use crate::messaging_member::MessagingMember;
use conduit_core::port::{Destination, MessageCodec, MessageConnection};
use conduit_core::{JobError, ProcessingError, Result, Transaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Typed messaging over a shared connection.
///
/// Inside a job, every destination gets one `MessagingMember` per
/// transaction, registered on first use; its session commits or rolls back
/// with the job.
pub struct TransactionalMessaging<T> {
    connection: Arc<dyn MessageConnection>,
    codec: Arc<dyn MessageCodec<T>>,
}

impl<T> Clone for TransactionalMessaging<T> {
    fn clone(&self) -> Self {
        Self {
            connection: Arc::clone(&self.connection),
            codec: Arc::clone(&self.codec),
        }
    }
}

impl<T: Serialize + DeserializeOwned + 'static> TransactionalMessaging<T> {
    pub fn json(connection: Arc<dyn MessageConnection>) -> Self {
        Self::new(connection, Arc::new(JsonCodec::<T>::new()))
    }
}

impl<T: 'static> TransactionalMessaging<T> {
    pub fn new(connection: Arc<dyn MessageConnection>, codec: Arc<dyn MessageCodec<T>>) -> Self {
        Self { connection, codec }
    }

    /// Member for `destination` in the current transaction, created on first use
    pub fn member(&self, destination: &Destination) -> Result<Arc<MessagingMember<T>>> {
        let transaction = Transaction::current().ok_or_else(|| {
            JobError::InvalidState("no transaction bound to the current thread".to_string())
        })?;
        let member_id =
            MessagingMember::<T>::member_id_for(self.connection.connection_id(), destination);

        transaction.register_member_if_absent(&member_id, |id| {
            debug!(member_id = %id, "Enlisting messaging session");
            MessagingMember::open(
                id,
                &*self.connection,
                destination.clone(),
                Arc::clone(&self.codec),
            )
        })
    }

    /// Send within the current transaction; visible once it commits
    pub fn publish(&self, destination: &Destination, value: &T) -> Result<()> {
        self.member(destination)?.send(value)?;
        Ok(())
    }

    /// Receive within the current transaction; redelivered if it rolls back
    pub fn receive(&self, destination: &Destination, timeout_millis: i64) -> Result<Option<T>> {
        Ok(self.member(destination)?.receive(timeout_millis)?)
    }

    /// Send immediately on a throw-away session, outside any transaction
    pub fn publish_non_transactional(&self, destination: &Destination, value: &T) -> Result<()> {
        let message = self.codec.encode(value)?;
        let session = self
            .connection
            .create_session(false)
            .map_err(ProcessingError::from)?;

        let sent = session
            .create_producer(destination)
            .and_then(|producer| producer.send(message));
        let closed = session.close();
        sent.and(closed).map_err(ProcessingError::from)?;
        Ok(())
    }
}
