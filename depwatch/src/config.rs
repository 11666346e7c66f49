//! Runtime dispatch configuration.
//!
//! With the `singlethread` feature (default) the mode is per thread, like the
//! subscriber stack. With only `multithread` it is one process-wide setting.

/// Who is responsible for the order in which notified subscribers run.
///
/// Defaults to `Synchronous`, unlike hosts that ship with an async scheduler
/// enabled, since this crate calls `update()` directly unless told otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dispatch {
    /// `notify` runs subscribers directly and sorts them by id so the order is
    /// deterministic
    #[default]
    Synchronous,
    /// A batching or async scheduler downstream of `update()` enforces its own
    /// ordering, so `notify` dispatches in insertion order
    Scheduled,
}

#[cfg(feature = "singlethread")]
mod storage {
    use super::Dispatch;
    use std::cell::Cell;

    thread_local! {
        static DISPATCH: Cell<Dispatch> = const { Cell::new(Dispatch::Synchronous) };
    }

    pub(super) fn get() -> Dispatch { DISPATCH.with(|d| d.get()) }
    pub(super) fn set(mode: Dispatch) -> Dispatch { DISPATCH.with(|d| d.replace(mode)) }
}

#[cfg(not(feature = "singlethread"))]
mod storage {
    use super::Dispatch;
    use std::sync::atomic::{AtomicBool, Ordering};

    static SCHEDULED: AtomicBool = AtomicBool::new(false);

    fn from_flag(scheduled: bool) -> Dispatch { if scheduled { Dispatch::Scheduled } else { Dispatch::Synchronous } }

    pub(super) fn get() -> Dispatch { from_flag(SCHEDULED.load(Ordering::SeqCst)) }
    pub(super) fn set(mode: Dispatch) -> Dispatch { from_flag(SCHEDULED.swap(mode == Dispatch::Scheduled, Ordering::SeqCst)) }
}

/// The active dispatch mode
pub fn dispatch() -> Dispatch { storage::get() }

/// Set the dispatch mode, returning the previous one
pub fn set_dispatch(mode: Dispatch) -> Dispatch {
    let previous = storage::set(mode);
    if previous != mode {
        tracing::debug!("dispatch mode {:?} -> {:?}", previous, mode);
    }
    previous
}

/// Run `f` under `mode`, restoring the previous mode afterwards (also on panic)
pub fn with_dispatch<R>(mode: Dispatch, f: impl FnOnce() -> R) -> R {
    struct Restore(Dispatch);
    impl Drop for Restore {
        fn drop(&mut self) { set_dispatch(self.0); }
    }

    let _restore = Restore(set_dispatch(mode));
    f()
}

/// Whether `notify` must sort its snapshot by subscriber id before dispatch.
/// Never in `production` builds; otherwise only in synchronous mode.
pub fn sorts_subscribers() -> bool { !cfg!(feature = "production") && dispatch() == Dispatch::Synchronous }
