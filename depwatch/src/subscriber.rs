use std::sync::{Arc, Weak};

use crate::{Dep, DepId, SubscriberId, UpdateError};

/// A re-evaluatable computation that reads deps and is re-run when one of them notifies.
///
/// Implementations own their dependency bookkeeping: [`Dep::depend`] only hands the
/// dep over via [`add_dep`](Subscriber::add_dep), and the subscriber decides whether
/// to record it, dedup it, or register itself with [`Dep::add_subscriber`].
pub trait Subscriber: Send + Sync {
    /// Stable identity, used to order synchronous dispatch
    fn id(&self) -> SubscriberId;

    /// Called by [`Dep::depend`] while this subscriber is the current one
    fn add_dep(&self, dep: &Dep);

    /// The deps this subscriber currently depends on, in the order it recorded them
    fn deps(&self) -> Vec<DepId>;

    /// The most recently recorded dep. The self-notify path keeps a self-subscriber
    /// only while this is the notifying dep.
    fn last_dep(&self) -> Option<DepId> { self.deps().last().copied() }

    /// Recompute. May read and write deps, push the subscriber stack, or notify further.
    fn update(&self) -> Result<(), UpdateError>;
}

/// Non-owning reference to a subscriber, as held by a [`Dep`].
/// Two references are equal when they point at the same allocation.
#[derive(Clone)]
pub struct WeakSubscriber(Weak<dyn Subscriber>);

impl WeakSubscriber {
    pub fn upgrade(&self) -> Option<Arc<dyn Subscriber>> { self.0.upgrade() }

    pub fn is_alive(&self) -> bool { self.0.strong_count() > 0 }

    // Thin pointer so the comparison ignores which vtable the fat pointer carries
    fn addr(&self) -> *const () { self.0.as_ptr() as *const () }
}

impl PartialEq for WeakSubscriber {
    fn eq(&self, other: &Self) -> bool { self.addr() == other.addr() }
}

impl Eq for WeakSubscriber {}

impl std::fmt::Debug for WeakSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.upgrade() {
            Some(subscriber) => write!(f, "WeakSubscriber({})", subscriber.id()),
            None => write!(f, "WeakSubscriber(<dropped>)"),
        }
    }
}

impl<S: Subscriber + 'static> From<&Arc<S>> for WeakSubscriber {
    fn from(subscriber: &Arc<S>) -> Self {
        let weak: Weak<S> = Arc::downgrade(subscriber);
        WeakSubscriber(weak)
    }
}

impl From<&Arc<dyn Subscriber>> for WeakSubscriber {
    fn from(subscriber: &Arc<dyn Subscriber>) -> Self { WeakSubscriber(Arc::downgrade(subscriber)) }
}

impl From<Weak<dyn Subscriber>> for WeakSubscriber {
    fn from(subscriber: Weak<dyn Subscriber>) -> Self { WeakSubscriber(subscriber) }
}

impl From<&WeakSubscriber> for WeakSubscriber {
    fn from(subscriber: &WeakSubscriber) -> Self { subscriber.clone() }
}
