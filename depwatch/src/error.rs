use thiserror::Error;

use crate::{DepId, SubscriberId};

/// Failure reported by a subscriber's `update()`.
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("update failed: {0}")]
    Failed(Box<dyn std::error::Error + Send + Sync + 'static>),
    #[error("update failed: {0}")]
    Message(String),
    #[error("scheduler channel closed")]
    Disconnected,
}

impl From<String> for UpdateError {
    fn from(message: String) -> Self { UpdateError::Message(message) }
}

impl From<&str> for UpdateError {
    fn from(message: &str) -> Self { UpdateError::Message(message.to_string()) }
}

/// A notify pass stopped at the first subscriber whose update failed.
/// Subscribers later in the snapshot were not dispatched.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("{subscriber} failed while notified by {dep}: {source}")]
    Update {
        subscriber: SubscriberId,
        dep: DepId,
        #[source]
        source: UpdateError,
    },
}

impl NotifyError {
    pub fn subscriber(&self) -> SubscriberId {
        match self {
            NotifyError::Update { subscriber, .. } => *subscriber,
        }
    }
}
