// Conduit Infrastructure - Messaging Adapter
// Implements: TransactionMember (messaging session), MessageCodec (JSON),
// transport ports (in-memory broker)

mod codec;
pub mod memory;
mod messaging_member;
mod transactional;

pub use codec::JsonCodec;
pub use memory::{InMemoryBroker, InMemoryConnection, SessionStats};
pub use messaging_member::MessagingMember;
pub use transactional::TransactionalMessaging;
