// Thread-scoped variable injection

use super::{ContextDecorator, Work};
use crate::application::context::ThreadSlot;

/// Installs a value into a thread slot for the duration of the work.
///
/// A `None` value hides any outer value rather than inheriting it. The
/// previous value is restored on success, error and panic alike.
pub struct ThreadSlotDecorator<V: 'static> {
    slot: ThreadSlot<V>,
    value: Option<V>,
}

impl<V: Send + 'static> ThreadSlotDecorator<V> {
    pub fn new(slot: ThreadSlot<V>, value: Option<V>) -> Self {
        Self { slot, value }
    }
}

impl<V: Send + 'static> ContextDecorator for ThreadSlotDecorator<V> {
    fn decorate<T: Send + 'static>(self, work: Work<T>) -> Work<T> {
        let Self { slot, value } = self;
        Box::new(move || slot.scoped(value, work))
    }
}
