use crate::{CurrentSubscriber, Dep, DepId, Subscriber, SubscriberId, UpdateError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

// Passes a single run may take when the callback keeps re-notifying itself
const MAX_PASSES: usize = 100;

/// A CallbackSubscriber wraps a callback which is re-run whenever one of the
/// deps it read during its last run notifies.
///
/// Every run re-collects deps: deps read during the run stay subscribed, deps
/// from the previous run that were not read again are unsubscribed afterwards.
///
/// A run that re-enters itself (the callback writes a dep it read earlier) does not
/// nest. The inner request is recorded and the callback runs again once the current
/// pass has swept, up to a fixed number of passes.
///
/// Dropping the last handle unsubscribes from every dep.
#[derive(Clone)]
pub struct CallbackSubscriber(Arc<Inner>);

struct Inner {
    id: SubscriberId,
    // The callback to run inside this subscriber's context
    callback: Box<dyn Fn() + Send + Sync>,
    // Deps collected by the last completed run, in first-read order
    deps: RwLock<Vec<Dep>>,
    // Deps read so far during the run in progress
    pending: RwLock<Vec<Dep>>,
    running: AtomicBool,
    rerun: AtomicBool,
    this: Weak<Inner>,
}

impl CallbackSubscriber {
    /// Create a subscriber. The callback does not run until [`run`](Self::run) is called.
    pub fn new<F: Fn() + Send + Sync + 'static>(callback: F) -> Self {
        Self(Arc::new_cyclic(|this| Inner {
            id: SubscriberId::next(),
            callback: Box::new(callback),
            deps: RwLock::new(Vec::new()),
            pending: RwLock::new(Vec::new()),
            running: AtomicBool::new(false),
            rerun: AtomicBool::new(false),
            this: this.clone(),
        }))
    }

    pub fn id(&self) -> SubscriberId { self.0.id }

    /// Run the callback with this subscriber as the current one, then drop stale deps
    pub fn run(&self) { self.0.run() }

    /// Unsubscribe from every dep and forget them
    pub fn teardown(&self) {
        let deps = std::mem::take(&mut *self.0.deps.write().expect("deps lock is poisoned"));
        for dep in deps {
            dep.remove_subscriber(&self.0);
        }
    }

    /// Shared handle suitable for [`CurrentSubscriber::push`] or [`Dep::add_self_subscriber`]
    pub fn as_subscriber(&self) -> Arc<dyn Subscriber> { self.0.clone() }
}

impl Inner {
    fn run(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::trace!("{} re-entered, running again after the current pass", self.id);
            self.rerun.store(true, Ordering::SeqCst);
            return;
        }
        let _running = Running(&self.running);

        for pass in 1..=MAX_PASSES {
            self.pass();
            if !self.rerun.swap(false, Ordering::SeqCst) {
                return;
            }
            if pass == MAX_PASSES {
                tracing::warn!("{} still re-notifying itself after {} passes, giving up", self.id, MAX_PASSES);
            }
        }
    }

    fn pass(&self) {
        self.pending.write().expect("pending lock is poisoned").clear();

        if let Some(this) = self.this.upgrade() {
            let _guard = CurrentSubscriber::scope(Some(this as Arc<dyn Subscriber>));
            (self.callback)();
        }

        // Sweep: anything from the previous pass that wasn't read this time
        let fresh = std::mem::take(&mut *self.pending.write().expect("pending lock is poisoned"));
        let stale = {
            let mut deps = self.deps.write().expect("deps lock is poisoned");
            let previous = std::mem::replace(&mut *deps, fresh);
            previous.into_iter().filter(|dep| !deps.contains(dep)).collect::<Vec<_>>()
        };
        for dep in stale {
            tracing::trace!("{} dropping stale {}", self.id, dep.id());
            dep.remove_subscriber(self.weak());
        }
    }

    fn weak(&self) -> crate::WeakSubscriber {
        let this: Weak<dyn Subscriber> = self.this.clone();
        this.into()
    }
}

// Clears the running flag when the run ends, including by panic
struct Running<'a>(&'a AtomicBool);

impl Drop for Running<'_> {
    fn drop(&mut self) { self.0.store(false, Ordering::SeqCst); }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let deps = std::mem::take(self.deps.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner()));
        for dep in deps {
            dep.remove_subscriber(self.weak());
        }
    }
}

impl Subscriber for Inner {
    fn id(&self) -> SubscriberId { self.id }

    fn add_dep(&self, dep: &Dep) {
        {
            let mut pending = self.pending.write().expect("pending lock is poisoned");
            if pending.contains(dep) {
                return;
            }
            pending.push(dep.clone());
        }

        // Only register with deps we weren't already subscribed to
        let known = self.deps.read().expect("deps lock is poisoned").contains(dep);
        if !known {
            dep.add_subscriber(self.weak());
        }
    }

    fn deps(&self) -> Vec<DepId> { self.deps.read().expect("deps lock is poisoned").iter().map(Dep::id).collect() }

    fn update(&self) -> Result<(), UpdateError> {
        self.run();
        Ok(())
    }
}

impl Subscriber for CallbackSubscriber {
    fn id(&self) -> SubscriberId { self.0.id }
    fn add_dep(&self, dep: &Dep) { self.0.add_dep(dep) }
    fn deps(&self) -> Vec<DepId> { self.0.deps() }
    fn update(&self) -> Result<(), UpdateError> { self.0.update() }
}

impl std::fmt::Debug for CallbackSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackSubscriber").field("id", &self.0.id).field("deps", &self.0.deps()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[test]
    fn test_run_collects_deps_once() {
        let a = Dep::new();
        let b = Dep::new();
        let subscriber = {
            let (a, b) = (a.clone(), b.clone());
            CallbackSubscriber::new(move || {
                a.depend();
                b.depend();
                a.depend();
            })
        };

        subscriber.run();
        assert_eq!(Subscriber::deps(&subscriber), vec![a.id(), b.id()]);
        assert_eq!(a.subscriber_count(), 1);
        assert_eq!(b.subscriber_count(), 1);

        // a second run must not register again
        subscriber.run();
        assert_eq!(a.subscriber_count(), 1);
        assert_eq!(b.subscriber_count(), 1);
    }

    #[test]
    fn test_stale_deps_are_swept() {
        let a = Dep::new();
        let b = Dep::new();
        let read_b = Arc::new(AtomicBool::new(true));
        let runs = Arc::new(AtomicUsize::new(0));
        let subscriber = {
            let (a, b, read_b, runs) = (a.clone(), b.clone(), read_b.clone(), runs.clone());
            CallbackSubscriber::new(move || {
                runs.fetch_add(1, Ordering::SeqCst);
                a.depend();
                if read_b.load(Ordering::SeqCst) {
                    b.depend();
                }
            })
        };

        subscriber.run();
        assert_eq!(b.subscriber_count(), 1);

        read_b.store(false, Ordering::SeqCst);
        a.notify_all().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(b.subscriber_count(), 0);
        assert_eq!(Subscriber::deps(&subscriber), vec![a.id()]);

        // b no longer reaches the subscriber
        b.notify_all().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_teardown_unsubscribes() {
        let a = Dep::new();
        let subscriber = {
            let a = a.clone();
            CallbackSubscriber::new(move || a.depend())
        };
        subscriber.run();
        assert_eq!(a.subscriber_count(), 1);

        subscriber.teardown();
        assert_eq!(a.subscriber_count(), 0);
        assert!(Subscriber::deps(&subscriber).is_empty());
    }

    #[test]
    fn test_nested_runs_track_separately() {
        let outer_dep = Dep::new();
        let inner_dep = Dep::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let inner = {
            let inner_dep = inner_dep.clone();
            CallbackSubscriber::new(move || inner_dep.depend())
        };
        let outer = {
            let (outer_dep, inner, seen) = (outer_dep.clone(), inner.clone(), seen.clone());
            CallbackSubscriber::new(move || {
                inner.run();
                // back in the outer context after the nested run
                seen.lock().unwrap().push(CurrentSubscriber::current().map(|s| s.id()));
                outer_dep.depend();
            })
        };

        outer.run();
        assert_eq!(*seen.lock().unwrap(), vec![Some(outer.id())]);
        assert_eq!(Subscriber::deps(&outer), vec![outer_dep.id()]);
        assert_eq!(Subscriber::deps(&inner), vec![inner_dep.id()]);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let dep = Dep::new();
        for _ in 0..100 {
            let subscriber = {
                let dep = dep.clone();
                CallbackSubscriber::new(move || dep.depend())
            };
            subscriber.run();
            assert_eq!(dep.subscriber_count(), 1);
        }
        assert_eq!(dep.subscriber_count(), 0);
    }

    #[test]
    fn test_clone_keeps_subscription_alive() {
        let dep = Dep::new();
        let subscriber = {
            let dep = dep.clone();
            CallbackSubscriber::new(move || dep.depend())
        };
        subscriber.run();

        let handle = subscriber.clone();
        drop(subscriber);
        assert_eq!(dep.subscriber_count(), 1);
        drop(handle);
        assert_eq!(dep.subscriber_count(), 0);
    }

    #[test]
    fn test_self_triggered_run_keeps_deps() {
        use crate::Tracked;

        let a = Tracked::new(0);
        let b = Tracked::new(0);
        let runs = Arc::new(AtomicUsize::new(0));
        let subscriber = {
            let (a, b, runs) = (a.clone(), b.clone(), runs.clone());
            CallbackSubscriber::new(move || {
                runs.fetch_add(1, Ordering::SeqCst);
                let value = a.get();
                if b.peek() != value {
                    b.set(value).expect("notify b");
                }
                b.get();
            })
        };

        subscriber.run();
        assert_eq!(Subscriber::deps(&subscriber), vec![a.dep().id(), b.dep().id()]);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // writing b re-notifies the subscriber mid-pass, which becomes a second pass
        a.set(1).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(Subscriber::deps(&subscriber), vec![a.dep().id(), b.dep().id()]);
        assert_eq!(a.dep().subscriber_count(), 1);
        assert_eq!(b.dep().subscriber_count(), 1);

        a.set(2).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 5);
        assert_eq!(b.peek(), 2);
    }

    #[test]
    fn test_self_notifying_callback_is_bounded() {
        use crate::Tracked;

        let counter = Tracked::new(0usize);
        let subscriber = {
            let counter = counter.clone();
            CallbackSubscriber::new(move || {
                let next = counter.get() + 1;
                counter.set(next).expect("notify counter");
            })
        };

        subscriber.run();
        assert_eq!(counter.peek(), MAX_PASSES);

        // the flags are reset, so the subscriber still reacts afterwards
        counter.set(0).unwrap();
        assert_eq!(counter.peek(), MAX_PASSES);
    }
}
