use std::sync::{Arc, RwLock};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::{Dep, DepId, Subscriber, SubscriberId, UpdateError};

/// A subscriber that defers its work to a scheduler: `update()` only enqueues
/// its id on a channel, and the receiving side decides when and in which order
/// to act. Pair it with [`Dispatch::Scheduled`](crate::config::Dispatch::Scheduled).
pub struct QueuedSubscriber {
    id: SubscriberId,
    sender: UnboundedSender<SubscriberId>,
    deps: RwLock<Vec<DepId>>,
}

impl QueuedSubscriber {
    pub fn new(sender: UnboundedSender<SubscriberId>) -> Arc<Self> {
        Arc::new(Self { id: SubscriberId::next(), sender, deps: RwLock::new(Vec::new()) })
    }

    /// A subscriber together with the receiving end of its own queue
    pub fn channel() -> (Arc<Self>, UnboundedReceiver<SubscriberId>) {
        let (sender, receiver) = unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl Subscriber for QueuedSubscriber {
    fn id(&self) -> SubscriberId { self.id }

    fn add_dep(&self, dep: &Dep) {
        let mut deps = self.deps.write().expect("deps lock is poisoned");
        if !deps.contains(&dep.id()) {
            deps.push(dep.id());
        }
    }

    fn deps(&self) -> Vec<DepId> { self.deps.read().expect("deps lock is poisoned").clone() }

    fn update(&self) -> Result<(), UpdateError> { self.sender.send(self.id).map_err(|_| UpdateError::Disconnected) }
}
