use std::sync::{Arc, RwLock, Weak};

use tracing::{debug, trace};

use crate::{CurrentSubscriber, DepId, NotifyError, Subscriber, WeakSubscriber, config};

/// An observable unit. Reads call [`depend`](Dep::depend) to link the current
/// subscriber, writes call [`notify`](Dep::notify) to fan the change out.
///
/// Holds two independent lists of non-owning subscriber references:
/// - the full list, reached by `notify(false)`
/// - the self list, reached by `notify(true)`, whose entries are revalidated
///   (and dropped when stale) on every self-notification
///
/// Cloning a `Dep` shares the same id and lists.
#[derive(Clone)]
pub struct Dep(Arc<Inner>);

struct Inner {
    id: DepId,
    subscribers: RwLock<Vec<WeakSubscriber>>,
    self_subscribers: RwLock<Vec<WeakSubscriber>>,
}

/// A `Dep` reference that does not keep the lists alive
#[derive(Clone)]
pub struct WeakDep {
    id: DepId,
    inner: Weak<Inner>,
}

impl Default for Dep {
    fn default() -> Self { Self::new() }
}

impl Dep {
    pub fn new() -> Self {
        Self(Arc::new(Inner { id: DepId::next(), subscribers: RwLock::new(Vec::new()), self_subscribers: RwLock::new(Vec::new()) }))
    }

    pub fn id(&self) -> DepId { self.0.id }

    pub fn downgrade(&self) -> WeakDep { WeakDep { id: self.0.id, inner: Arc::downgrade(&self.0) } }

    /// Append to the full list. Adding the same subscriber twice lists it twice.
    pub fn add_subscriber(&self, subscriber: impl Into<WeakSubscriber>) {
        self.0.subscribers.write().expect("subscribers lock is poisoned").push(subscriber.into());
    }

    /// Remove the first occurrence from both lists. Absent entries are ignored.
    pub fn remove_subscriber(&self, subscriber: impl Into<WeakSubscriber>) {
        let subscriber = subscriber.into();
        remove_first(&mut self.0.subscribers.write().expect("subscribers lock is poisoned"), &subscriber);
        remove_first(&mut self.0.self_subscribers.write().expect("self subscribers lock is poisoned"), &subscriber);
    }

    /// Append to the self list.
    pub fn add_self_subscriber(&self, subscriber: impl Into<WeakSubscriber>) {
        self.0.self_subscribers.write().expect("self subscribers lock is poisoned").push(subscriber.into());
    }

    /// Remove the first occurrence from the self list only.
    pub fn remove_self_subscriber(&self, subscriber: impl Into<WeakSubscriber>) {
        let subscriber = subscriber.into();
        remove_first(&mut self.0.self_subscribers.write().expect("self subscribers lock is poisoned"), &subscriber);
    }

    /// Hand this dep to the current subscriber, if there is one
    pub fn depend(&self) {
        if let Some(subscriber) = CurrentSubscriber::current() {
            subscriber.add_dep(self);
        }
    }

    /// Notify the full list (`only_self == false`) or the self list (`only_self == true`)
    pub fn notify(&self, only_self: bool) -> Result<(), NotifyError> {
        if only_self { self.notify_self() } else { self.notify_all() }
    }

    /// Run `update()` on every subscriber of the full list as it stood when this call began.
    ///
    /// In synchronous dispatch the snapshot runs in ascending id order, otherwise in
    /// insertion order. Stops at the first failing update.
    pub fn notify_all(&self) -> Result<(), NotifyError> {
        let mut subscribers = self.snapshot(&self.0.subscribers);
        if config::sorts_subscribers() {
            subscribers.sort_by_key(|s| s.id());
        }

        for subscriber in subscribers {
            trace!("{} -> {}", self.0.id, subscriber.id());
            subscriber.update().map_err(|source| NotifyError::Update { subscriber: subscriber.id(), dep: self.0.id, source })?;
        }
        Ok(())
    }

    /// Run `update()` on every self-subscriber as the list stood when this call began,
    /// lowest id first. Afterwards, a subscriber whose last dep is no longer this one
    /// is dropped from the self list.
    pub fn notify_self(&self) -> Result<(), NotifyError> {
        let mut subscribers = self.snapshot(&self.0.self_subscribers);
        if config::sorts_subscribers() {
            subscribers.sort_by_key(|s| std::cmp::Reverse(s.id()));
        }

        // walked back to front, so the descending sort dispatches in ascending id order
        for subscriber in subscribers.into_iter().rev() {
            trace!("{} -> {} (self)", self.0.id, subscriber.id());
            subscriber.update().map_err(|source| NotifyError::Update { subscriber: subscriber.id(), dep: self.0.id, source })?;

            if subscriber.last_dep() == Some(self.0.id) {
                continue;
            }
            debug!("{} no longer ends on {}, dropping self subscription", subscriber.id(), self.0.id);
            self.remove_self_subscriber(&subscriber);
        }
        Ok(())
    }

    pub fn subscriber_count(&self) -> usize { self.0.subscribers.read().expect("subscribers lock is poisoned").len() }

    pub fn self_subscriber_count(&self) -> usize { self.0.self_subscribers.read().expect("self subscribers lock is poisoned").len() }

    pub fn has_subscriber(&self, subscriber: impl Into<WeakSubscriber>) -> bool {
        let subscriber = subscriber.into();
        self.0.subscribers.read().expect("subscribers lock is poisoned").contains(&subscriber)
    }

    pub fn has_self_subscriber(&self, subscriber: impl Into<WeakSubscriber>) -> bool {
        let subscriber = subscriber.into();
        self.0.self_subscribers.read().expect("self subscribers lock is poisoned").contains(&subscriber)
    }

    // Copy the list under the lock, then release it before any update() runs
    fn snapshot(&self, list: &RwLock<Vec<WeakSubscriber>>) -> Vec<Arc<dyn Subscriber>> {
        let entries = list.read().expect("subscriber list lock is poisoned").clone();
        entries
            .iter()
            .filter_map(|entry| {
                let subscriber = entry.upgrade();
                if subscriber.is_none() {
                    debug!("{} skipping dropped subscriber", self.0.id);
                }
                subscriber
            })
            .collect()
    }
}

impl PartialEq for Dep {
    fn eq(&self, other: &Self) -> bool { self.0.id == other.0.id }
}

impl Eq for Dep {}

impl std::fmt::Debug for Dep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.0.id)
            .field("subscribers", &self.subscriber_count())
            .field("self_subscribers", &self.self_subscriber_count())
            .finish()
    }
}

impl WeakDep {
    pub fn id(&self) -> DepId { self.id }

    pub fn upgrade(&self) -> Option<Dep> { self.inner.upgrade().map(Dep) }
}

impl std::fmt::Debug for WeakDep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "WeakDep({})", self.id) }
}

fn remove_first(list: &mut Vec<WeakSubscriber>, subscriber: &WeakSubscriber) {
    if let Some(index) = list.iter().position(|entry| entry == subscriber) {
        list.remove(index);
    }
}
