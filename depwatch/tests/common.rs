use depwatch::{Dep, DepId, Subscriber, SubscriberId, UpdateError};
use std::sync::{Arc, Mutex};
use tracing::Level;

// Initialize tracing for tests
#[ctor::ctor]
fn init_tracing() { tracing_subscriber::fmt().with_max_level(Level::DEBUG).with_test_writer().init(); }

/// Shared record of which subscriber ids were updated, in call order
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<usize>>>);

#[allow(unused)]
impl CallLog {
    pub fn new() -> Self { Self::default() }
    pub fn record(&self, id: SubscriberId) { self.0.lock().unwrap().push(id.into()); }
    /// Drain the log
    pub fn take(&self) -> Vec<usize> { self.0.lock().unwrap().drain(..).collect() }
}

type OnUpdate = Box<dyn Fn(&Probe) -> Result<(), UpdateError> + Send + Sync>;

/// A subscriber with a fixed raw id that logs each update, then runs an optional hook.
/// Its deps are whatever the test sets, plus anything recorded through `add_dep`.
pub struct Probe {
    id: SubscriberId,
    log: CallLog,
    deps: Mutex<Vec<DepId>>,
    on_update: Option<OnUpdate>,
}

#[allow(unused)]
impl Probe {
    pub fn new(id: usize, log: &CallLog) -> Arc<Self> {
        Arc::new(Self { id: SubscriberId::from_raw(id), log: log.clone(), deps: Mutex::new(Vec::new()), on_update: None })
    }

    pub fn with_update<F>(id: usize, log: &CallLog, on_update: F) -> Arc<Self>
    where F: Fn(&Probe) -> Result<(), UpdateError> + Send + Sync + 'static {
        Arc::new(Self {
            id: SubscriberId::from_raw(id),
            log: log.clone(),
            deps: Mutex::new(Vec::new()),
            on_update: Some(Box::new(on_update)),
        })
    }

    pub fn set_deps(&self, deps: &[&Dep]) { *self.deps.lock().unwrap() = deps.iter().map(|dep| dep.id()).collect(); }
}

impl Subscriber for Probe {
    fn id(&self) -> SubscriberId { self.id }

    fn add_dep(&self, dep: &Dep) { self.deps.lock().unwrap().push(dep.id()); }

    fn deps(&self) -> Vec<DepId> { self.deps.lock().unwrap().clone() }

    fn update(&self) -> Result<(), UpdateError> {
        self.log.record(self.id);
        match &self.on_update {
            Some(on_update) => on_update(self),
            None => Ok(()),
        }
    }
}
