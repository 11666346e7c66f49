/*!
Dependency tracking and change propagation for fine-grained reactivity.

# Pieces
- [`Dep`] - an observable unit. Reads call [`Dep::depend`], writes call [`Dep::notify`].
- [`Subscriber`] - implemented by the host: a computation that reads deps and is re-run via `update()`.
- [`CurrentSubscriber`] - the stack of subscribers being evaluated. `depend()` links the top of it.
- [`config`] - whether `notify` sorts by subscriber id (synchronous) or leaves ordering to a scheduler.

A dep holds two lists. `notify(false)` reaches every full subscriber, lowest id first in
synchronous mode. `notify(true)` reaches the self-subscribers, lowest id first as well, and drops
any whose last recorded dep is no longer this one.

Both paths dispatch from a snapshot, so subscribers added or removed by an `update()` do not affect
the pass in progress.

# Basic usage

```rust
use depwatch::*;

let age = Tracked::new(29);
let renderer = {
    let age = age.clone();
    CallbackSubscriber::new(move || println!("age: {}", age.get()))
};

renderer.run(); // age: 29, and now subscribed to `age`
age.set(70).unwrap(); // age: 70
```

# Scoped evaluation

```rust
use depwatch::*;

let dep = Dep::new();
let subscriber = CallbackSubscriber::new(|| {});
{
    let _guard = CurrentSubscriber::scope(Some(subscriber.as_subscriber()));
    dep.depend();
} // popped here, even on panic
assert!(CurrentSubscriber::current().is_none());
assert_eq!(dep.subscriber_count(), 1);
```
*/

mod callback;
pub mod config;
mod context;
mod dep;
mod error;
mod id;
mod subscriber;
mod tracked;

#[cfg(feature = "tokio")]
mod queue;

pub use callback::*;
pub use context::*;
pub use dep::*;
pub use error::*;
pub use id::*;
pub use subscriber::*;
pub use tracked::*;

#[cfg(feature = "tokio")]
pub use queue::*;

// The multithread stack and dispatch mode are process-global, so tests touching them take turns
#[cfg(all(test, not(feature = "singlethread")))]
pub(crate) fn serial() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
