// Async notifier decorator - reports a job outcome to an observer

use super::Work;
use crate::application::panic_guard::execute_guarded;
use crate::error::JobError;
use crate::port::AsyncNotifier;
use std::sync::Arc;
use tracing::error;

/// Outermost link of the chain. Reports success or failure to an optional
/// observer; errors are translated to processing failures first.
///
/// Without an observer the decorator is a pure passthrough.
pub struct AsyncNotifierDecorator<T> {
    notifier: Option<Arc<dyn AsyncNotifier<T>>>,
}

impl<T: Send + 'static> AsyncNotifierDecorator<T> {
    pub fn new(notifier: Option<Arc<dyn AsyncNotifier<T>>>) -> Self {
        Self { notifier }
    }

    pub fn decorate(self, work: Work<T>) -> Work<T> {
        let Some(notifier) = self.notifier else {
            return work;
        };
        Box::new(move || match work() {
            Ok(value) => {
                shield("on_success", || notifier.on_success(&value));
                shield("on_done", || notifier.on_done(Some(&value), None));
                Ok(value)
            }
            Err(e) => {
                let e = e.into_processing();
                shield("on_error", || notifier.on_error(&e));
                shield("on_done", || notifier.on_done(None, Some(&e)));
                Err(e)
            }
        })
    }
}

fn shield(callback: &str, f: impl FnOnce()) {
    if let Err(panic_msg) = execute_guarded(f).into_result() {
        error!(callback, panic_msg = %panic_msg, "Notifier callback panicked");
    }
}
