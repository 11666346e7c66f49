use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_DEP_ID: AtomicUsize = AtomicUsize::new(0);
static NEXT_SUBSCRIBER_ID: AtomicUsize = AtomicUsize::new(0);

/// Process-unique identifier of a [`Dep`](crate::Dep), in creation order.
/// Only used for ordering and identity checks, never as a lookup key.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct DepId(usize);

impl DepId {
    pub(crate) fn next() -> Self { Self(NEXT_DEP_ID.fetch_add(1, Ordering::Relaxed)) }
}

impl From<DepId> for usize {
    fn from(id: DepId) -> Self { id.0 }
}

impl std::fmt::Display for DepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "dep#{}", self.0) }
}

/// Identifier of a subscriber. Ordered, so synchronous dispatch can sort by it.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SubscriberId(usize);

impl SubscriberId {
    /// Allocate a fresh id from the process-wide counter.
    pub fn next() -> Self { Self(NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed)) }

    /// Wrap an id managed by the host. The host is then responsible for uniqueness.
    pub const fn from_raw(id: usize) -> Self { Self(id) }
}

impl From<SubscriberId> for usize {
    fn from(id: SubscriberId) -> Self { id.0 }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "sub#{}", self.0) }
}
