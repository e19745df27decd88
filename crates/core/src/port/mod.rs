// Port Layer - Interfaces for external collaborators

pub mod async_notifier;
pub mod id_provider; // For deterministic testing
pub mod message_transport;
pub mod time_provider;
pub mod transaction_member;

// Re-exports
pub use async_notifier::AsyncNotifier;
pub use id_provider::IdProvider;
pub use message_transport::{
    Destination, MessageCodec, MessageConnection, MessageConsumer, MessageProducer,
    MessageSession, RawMessage, ReceiveTimeout, TransportError,
};
pub use time_provider::TimeProvider;
pub use transaction_member::TransactionMember;
