// Async Notifier Port
// Observer informed of a job's outcome

use crate::error::JobError;

/// Observer of a job outcome.
///
/// All callbacks default to no-ops. Panics raised by a callback are logged and
/// discarded; they never change the job's own result.
pub trait AsyncNotifier<T>: Send + Sync {
    fn on_success(&self, _result: &T) {}

    /// `error` is always the translated processing failure
    fn on_error(&self, _error: &JobError) {}

    /// Invoked last, exactly once, with either the result or the error
    fn on_done(&self, _result: Option<&T>, _error: Option<&JobError>) {}
}

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Notifier event recorded by `RecordingNotifier`
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum NotifierEvent<T> {
        Success(T),
        Error(String),
        Done(Option<T>, Option<String>),
    }

    /// Records callbacks; optionally panics inside `on_error`
    pub struct RecordingNotifier<T> {
        events: Mutex<Vec<NotifierEvent<T>>>,
        panic_on_error: bool,
    }

    impl<T: Clone> RecordingNotifier<T> {
        pub fn new() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                panic_on_error: false,
            }
        }

        pub fn panicking_on_error() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                panic_on_error: true,
            }
        }

        pub fn events(&self) -> Vec<NotifierEvent<T>> {
            self.events.lock().unwrap().clone()
        }
    }

    impl<T: Clone> Default for RecordingNotifier<T> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<T: Clone + Send> AsyncNotifier<T> for RecordingNotifier<T> {
        fn on_success(&self, result: &T) {
            self.events
                .lock()
                .unwrap()
                .push(NotifierEvent::Success(result.clone()));
        }

        fn on_error(&self, error: &JobError) {
            self.events
                .lock()
                .unwrap()
                .push(NotifierEvent::Error(error.to_string()));
            if self.panic_on_error {
                panic!("notifier failed in on_error");
            }
        }

        fn on_done(&self, result: Option<&T>, error: Option<&JobError>) {
            self.events.lock().unwrap().push(NotifierEvent::Done(
                result.cloned(),
                error.map(|e| e.to_string()),
            ));
        }
    }
}
