// Ambient execution context bound to the worker thread

mod slot;

pub use slot::{SlotGuard, ThreadSlot};

use crate::application::job::JobControl;
use crate::application::transaction::Transaction;
use crate::domain::{ExecutionIdentity, Locale, TransportContext, UserAgent};
use std::cell::RefCell;
use std::sync::Arc;

thread_local! {
    static IDENTITY_CELL: RefCell<Option<ExecutionIdentity>> = const { RefCell::new(None) };
    static LOCALE_CELL: RefCell<Option<Locale>> = const { RefCell::new(None) };
    static USER_AGENT_CELL: RefCell<Option<UserAgent>> = const { RefCell::new(None) };
    static TRANSPORT_CELL: RefCell<Option<TransportContext>> = const { RefCell::new(None) };
    static TRANSACTION_CELL: RefCell<Option<Arc<Transaction>>> = const { RefCell::new(None) };
    static THREAD_NAME_CELL: RefCell<Option<String>> = const { RefCell::new(None) };
    static JOB_CELL: RefCell<Option<Arc<JobControl>>> = const { RefCell::new(None) };
}

pub static IDENTITY: ThreadSlot<ExecutionIdentity> = ThreadSlot::new("identity", &IDENTITY_CELL);
pub static LOCALE: ThreadSlot<Locale> = ThreadSlot::new("locale", &LOCALE_CELL);
pub static USER_AGENT: ThreadSlot<UserAgent> = ThreadSlot::new("user_agent", &USER_AGENT_CELL);
pub static TRANSPORT: ThreadSlot<TransportContext> =
    ThreadSlot::new("transport", &TRANSPORT_CELL);
pub static TRANSACTION: ThreadSlot<Arc<Transaction>> =
    ThreadSlot::new("transaction", &TRANSACTION_CELL);

/// Display name of the current worker thread while a job decorates it
pub static THREAD_NAME: ThreadSlot<String> = ThreadSlot::new("thread_name", &THREAD_NAME_CELL);

pub(crate) static JOB: ThreadSlot<Arc<JobControl>> = ThreadSlot::new("job", &JOB_CELL);

pub fn current_identity() -> Option<ExecutionIdentity> {
    IDENTITY.get()
}

pub fn current_locale() -> Option<Locale> {
    LOCALE.get()
}

pub fn current_user_agent() -> Option<UserAgent> {
    USER_AGENT.get()
}

pub fn current_transport() -> Option<TransportContext> {
    TRANSPORT.get()
}
