// Fixed decorator chain

use super::{
    AsyncNotifierDecorator, ContextDecorator, ThreadNameDecorator, ThreadSlotDecorator,
    TransactionBoundary, Work,
};
use crate::application::context::{IDENTITY, LOCALE, TRANSPORT, USER_AGENT};
use crate::domain::JobInput;
use crate::port::AsyncNotifier;
use std::sync::Arc;

/// Wrap an adapted unit of work with the engine's decorators.
///
/// Innermost to outermost: thread-scoped variables (transport, user agent,
/// locale, identity), thread name, transaction boundary, notifier.
pub(crate) fn compose<T: Send + 'static>(
    work: Work<T>,
    input: &JobInput,
    boundary: TransactionBoundary,
    notifier: Option<Arc<dyn AsyncNotifier<T>>>,
) -> Work<T> {
    let work = ThreadSlotDecorator::new(TRANSPORT, input.transport.clone()).decorate(work);
    let work = ThreadSlotDecorator::new(USER_AGENT, input.user_agent.clone()).decorate(work);
    let work = ThreadSlotDecorator::new(LOCALE, input.locale.clone()).decorate(work);
    let work = ThreadSlotDecorator::new(IDENTITY, input.identity.clone()).decorate(work);
    let work = ThreadNameDecorator::new(input.display_name()).decorate(work);
    let work = boundary.decorate(work);
    AsyncNotifierDecorator::new(notifier).decorate(work)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::context::{current_identity, current_locale, current_user_agent};
    use crate::application::decorators::{current_thread_name, unit_of_work};
    use crate::application::transaction::Transaction;
    use crate::domain::{ExecutionIdentity, Locale, TransactionState, UserAgent};
    use crate::error::{BoxError, JobError};
    use crate::port::async_notifier::mocks::{NotifierEvent, RecordingNotifier};

    #[test]
    fn test_work_sees_full_context() {
        let input = JobInput::new(1)
            .with_name("report")
            .with_identity(ExecutionIdentity::new("s-1", "alice"))
            .with_locale(Locale::new("en-GB"))
            .with_user_agent(UserAgent::new("cli/1.0"));
        let tx = Arc::new(Transaction::new("tx-ctx"));

        let work = unit_of_work(|| {
            Ok::<_, BoxError>((
                current_identity().map(|i| i.principal),
                current_locale(),
                current_user_agent(),
                Transaction::current().map(|tx| tx.id().to_string()),
                current_thread_name(),
            ))
        });
        let (principal, locale, agent, tx_id, thread) =
            compose(work, &input, TransactionBoundary::new(Arc::clone(&tx)), None)().unwrap();

        assert_eq!(principal.as_deref(), Some("alice"));
        assert_eq!(locale, Some(Locale::new("en-GB")));
        assert_eq!(agent, Some(UserAgent::new("cli/1.0")));
        assert_eq!(tx_id.as_deref(), Some("tx-ctx"));
        assert!(thread.ends_with(";job:report"));

        assert_eq!(current_identity(), None);
        assert!(Transaction::current().is_none());
        assert_eq!(tx.state(), TransactionState::Released);
    }

    #[test]
    fn test_notifier_sees_transaction_outcome() {
        // the veto happens in the boundary, inside the notifier
        let notifier = Arc::new(RecordingNotifier::<u8>::new());
        let tx = Arc::new(Transaction::new("tx-fail"));
        tx.add_failure("recorded before run");

        let work = unit_of_work(|| Ok::<_, BoxError>(1u8));
        let err = compose(
            work,
            &JobInput::new(2),
            TransactionBoundary::new(tx),
            Some(notifier.clone() as Arc<dyn AsyncNotifier<u8>>),
        )()
        .unwrap_err();

        assert!(matches!(err, JobError::Processing(_)));
        assert!(matches!(notifier.events()[0], NotifierEvent::Error(_)));
    }
}
