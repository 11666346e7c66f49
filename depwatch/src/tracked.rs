use std::sync::{Arc, RwLock};

use crate::{Dep, NotifyError};

/// A value whose reads are tracked by the current subscriber and whose writes
/// notify the subscribers that read it.
///
/// Cloning a `Tracked` shares the value and its dep.
pub struct Tracked<T> {
    value: Arc<RwLock<T>>,
    dep: Dep,
}

impl<T> Clone for Tracked<T> {
    fn clone(&self) -> Self { Self { value: self.value.clone(), dep: self.dep.clone() } }
}

impl<T> Tracked<T> {
    pub fn new(value: T) -> Self { Self { value: Arc::new(RwLock::new(value)), dep: Dep::new() } }

    /// The dep behind this value
    pub fn dep(&self) -> &Dep { &self.dep }

    /// Calls a closure with a borrow of the current value, tracked by the current subscriber
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.dep.depend();
        self.peek_with(f)
    }

    /// Calls a closure with a borrow of the current value, without tracking
    pub fn peek_with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.value.read().expect("value lock is poisoned");
        f(&*guard)
    }

    /// Replace the value and notify every subscriber
    pub fn set(&self, value: T) -> Result<(), NotifyError> {
        self.store(value);
        self.dep.notify_all()
    }

    /// Replace the value and notify only the self-subscribers
    pub fn set_self(&self, value: T) -> Result<(), NotifyError> {
        self.store(value);
        self.dep.notify_self()
    }

    // The write lock is released before anyone is notified
    fn store(&self, value: T) { *self.value.write().expect("value lock is poisoned") = value; }
}

impl<T: Clone> Tracked<T> {
    /// Returns a clone of the current value, tracked by the current subscriber
    pub fn get(&self) -> T { self.with(T::clone) }

    /// Returns a clone of the current value, not tracked
    pub fn peek(&self) -> T { self.peek_with(T::clone) }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Tracked<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.peek_with(|value| f.debug_struct("Tracked").field("value", value).field("dep", &self.dep.id()).finish())
    }
}
