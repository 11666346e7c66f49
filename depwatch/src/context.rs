use crate::Subscriber;
use std::sync::Arc;

type Entry = Option<Arc<dyn Subscriber>>;

// Thread-local stack for nested evaluation (a subscriber's update evaluating another)
#[cfg(feature = "singlethread")]
mod stack {
    use super::Entry;
    use std::cell::RefCell;

    thread_local! {
        static SUBSCRIBER_STACK: RefCell<Vec<Entry>> = const { RefCell::new(Vec::new()) };
    }

    pub(super) fn with<R>(f: impl FnOnce(&mut Vec<Entry>) -> R) -> R { SUBSCRIBER_STACK.with(|stack| f(&mut stack.borrow_mut())) }
}

// One stack for the whole process. Callers must not evaluate subscribers on two threads at once.
#[cfg(not(feature = "singlethread"))]
mod stack {
    use super::Entry;
    use std::sync::Mutex;

    static SUBSCRIBER_STACK: Mutex<Vec<Entry>> = Mutex::new(Vec::new());

    pub(super) fn with<R>(f: impl FnOnce(&mut Vec<Entry>) -> R) -> R {
        f(&mut SUBSCRIBER_STACK.lock().expect("subscriber stack lock is poisoned"))
    }
}

/// Manages the stack of subscribers being evaluated.
/// The top of the stack is the subscriber that [`Dep::depend`](crate::Dep::depend) links to.
pub struct CurrentSubscriber {}

impl CurrentSubscriber {
    /// Push a subscriber, making it current. Pushing `None` suspends tracking
    /// until the matching [`pop`](Self::pop).
    pub fn push(subscriber: Option<Arc<dyn Subscriber>>) {
        let id = subscriber.as_ref().map(|s| s.id());
        let depth = stack::with(|stack| {
            stack.push(subscriber);
            stack.len()
        });
        tracing::trace!("push {:?} at depth {}", id, depth);
    }

    /// Pop the top of the stack, restoring the previous subscriber.
    /// Popping an empty stack is a no-op.
    pub fn pop() {
        // the popped entry drops outside the borrow
        let popped = stack::with(|stack| stack.pop());
        match popped {
            Some(entry) => tracing::trace!("pop {:?}", entry.map(|s| s.id())),
            None => tracing::trace!("pop on empty subscriber stack"),
        }
    }

    /// The subscriber currently being evaluated, if any
    pub fn current() -> Option<Arc<dyn Subscriber>> { stack::with(|stack| stack.last().cloned().flatten()) }

    /// Number of entries on the stack, including `None` entries
    pub fn depth() -> usize { stack::with(|stack| stack.len()) }

    /// Push `subscriber` and pop it again when the returned guard is dropped
    #[must_use = "the subscriber is popped as soon as the guard is dropped"]
    pub fn scope(subscriber: Option<Arc<dyn Subscriber>>) -> TargetGuard {
        Self::push(subscriber);
        TargetGuard { _private: () }
    }

    /// Run `f` without any current subscriber, so reads inside it are not tracked
    pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
        let _guard = Self::scope(None);
        f()
    }
}

/// Pops the subscriber stack exactly once when dropped, including during unwinding
pub struct TargetGuard {
    _private: (),
}

impl Drop for TargetGuard {
    fn drop(&mut self) { CurrentSubscriber::pop(); }
}
