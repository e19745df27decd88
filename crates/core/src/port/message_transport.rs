// Message Transport Port
// Send/receive primitives supplied by an external messaging library

use crate::error::ProcessingError;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Raw message as handed to / received from the transport
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawMessage {
    pub body: Vec<u8>,
    pub properties: HashMap<String, String>,
}

impl RawMessage {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Named queue or topic
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination(String);

impl Destination {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How long a receive may block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveTimeout {
    /// Wait at most the given duration
    Bounded(Duration),
    /// Poll without blocking
    NoWait,
    /// Block until a message arrives or the session is closed
    Unbounded,
}

impl ReceiveTimeout {
    /// Positive = bounded wait, zero = non-blocking poll, negative = unbounded wait
    pub fn from_millis(timeout_millis: i64) -> Self {
        match timeout_millis {
            0 => ReceiveTimeout::NoWait,
            t if t < 0 => ReceiveTimeout::Unbounded,
            t => ReceiveTimeout::Bounded(Duration::from_millis(t.unsigned_abs())),
        }
    }
}

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Session closed")]
    SessionClosed,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Unknown destination: {0}")]
    Destination(String),

    #[error("Transport IO error: {0}")]
    Io(String),
}

impl From<TransportError> for ProcessingError {
    fn from(err: TransportError) -> Self {
        ProcessingError::with_cause(format!("Messaging failure: {}", err), err)
    }
}

/// Connection shared by many sessions/transactions
pub trait MessageConnection: Send + Sync {
    /// Stable id, used to key transaction members per connection
    fn connection_id(&self) -> &str;

    fn create_session(&self, transacted: bool) -> Result<Box<dyn MessageSession>, TransportError>;

    fn close(&self) -> Result<(), TransportError>;
}

/// Session bound one-to-one with a transaction member.
///
/// `close` must be callable from another thread while a consumer of this
/// session blocks in `receive`, and must wake it up.
pub trait MessageSession: Send + Sync {
    fn create_producer(
        &self,
        destination: &Destination,
    ) -> Result<Box<dyn MessageProducer>, TransportError>;

    fn create_consumer(
        &self,
        destination: &Destination,
    ) -> Result<Box<dyn MessageConsumer>, TransportError>;

    fn commit(&self) -> Result<(), TransportError>;

    fn rollback(&self) -> Result<(), TransportError>;

    fn close(&self) -> Result<(), TransportError>;
}

pub trait MessageProducer: Send + Sync {
    fn send(&self, message: RawMessage) -> Result<(), TransportError>;
}

pub trait MessageConsumer: Send + Sync {
    /// `Ok(None)` when the timeout elapsed without a message
    fn receive(&self, timeout: ReceiveTimeout) -> Result<Option<RawMessage>, TransportError>;
}

/// Converts typed values to and from raw messages
pub trait MessageCodec<T>: Send + Sync {
    fn encode(&self, value: &T) -> Result<RawMessage, ProcessingError>;

    fn decode(&self, message: &RawMessage) -> Result<T, ProcessingError>;
}
