// Thread-scoped variable slots

use std::cell::RefCell;
use std::marker::PhantomData;
use std::thread::LocalKey;

/// Handle to a thread-local slot holding an optional value.
///
/// "Unset" (`None`) is distinct from any value: restoring a slot that was
/// never set leaves it unset again.
pub struct ThreadSlot<V: 'static> {
    name: &'static str,
    key: &'static LocalKey<RefCell<Option<V>>>,
}

impl<V: 'static> Clone for ThreadSlot<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V: 'static> Copy for ThreadSlot<V> {}

impl<V: 'static> ThreadSlot<V> {
    pub const fn new(name: &'static str, key: &'static LocalKey<RefCell<Option<V>>>) -> Self {
        Self { name, key }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get(&self) -> Option<V>
    where
        V: Clone,
    {
        self.key.with(|cell| cell.borrow().clone())
    }

    /// Borrow the current value. `f` must not write to the same slot.
    pub fn with<R>(&self, f: impl FnOnce(Option<&V>) -> R) -> R {
        self.key.with(|cell| f(cell.borrow().as_ref()))
    }

    pub fn is_set(&self) -> bool {
        self.key.with(|cell| cell.borrow().is_some())
    }

    /// Set the value, returning the previous one
    pub fn set(&self, value: V) -> Option<V> {
        self.key.with(|cell| cell.replace(Some(value)))
    }

    /// Unset the slot, returning the previous value
    pub fn remove(&self) -> Option<V> {
        self.key.with(|cell| cell.take())
    }

    /// Install `value` (`None` = unset) until the returned guard drops.
    /// The guard restores whatever was there before, including "unset".
    pub fn install(&self, value: Option<V>) -> SlotGuard<V> {
        let previous = self.key.with(|cell| cell.replace(value));
        SlotGuard {
            slot: *self,
            previous,
            _not_send: PhantomData,
        }
    }

    /// Run `f` with `value` installed
    pub fn scoped<R>(&self, value: Option<V>, f: impl FnOnce() -> R) -> R {
        let _guard = self.install(value);
        f()
    }
}

/// Restores a slot on drop, on success, error and unwinding alike.
/// Bound to the installing thread.
pub struct SlotGuard<V: 'static> {
    slot: ThreadSlot<V>,
    previous: Option<V>,
    _not_send: PhantomData<*const ()>,
}

impl<V: 'static> Drop for SlotGuard<V> {
    fn drop(&mut self) {
        let previous = self.previous.take();
        // the thread-local is gone during thread teardown
        let _ = self.slot.key.try_with(move |cell| {
            *cell.borrow_mut() = previous;
        });
    }
}
