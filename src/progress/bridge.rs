// ProgressBridge - a worker's handle to a progress indicator that may vanish
//
// The bridge and the indicator share a small cell holding the indicator's
// channel (or None). The indicator registers every cell in its teardown
// registry; when it is torn down it sets each cell to None before anything
// else happens. The cell lock is only held to read or write the pointer,
// never while calling into the channel, so a worker parked in shall_abort()
// cannot block the indicator's teardown and vice versa.

use crate::monitor::Monitor;
use crate::progress::{Progress, ProgressChannel};
use std::fmt;
use std::sync::{Arc, Weak};

/// Registration key of a bridge in an indicator's teardown registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

/// Current target of a bridge; None once the indicator is gone
pub(crate) type TargetCell = Monitor<Option<ProgressChannel>>;

#[derive(Debug, Default)]
struct RegistryState {
    next_id: u64,
    observers: Vec<(ObserverId, Arc<TargetCell>)>,
    torn_down: bool,
}

/// Cleanup observers of one indicator, notified in registration order
/// exactly once when teardown starts.
#[derive(Debug, Default)]
pub(crate) struct TeardownRegistry {
    state: Monitor<RegistryState>,
}

impl TeardownRegistry {
    /// Register a cell. Returns None when teardown has already happened.
    pub(crate) fn register(&self, cell: Arc<TargetCell>) -> Option<ObserverId> {
        self.state.with_lock(|state| {
            if state.torn_down {
                return None;
            }
            let id = ObserverId(state.next_id);
            state.next_id += 1;
            state.observers.push((id, cell));
            Some(id)
        })
    }

    /// Remove a cell; false if it was not registered (anymore)
    pub(crate) fn unregister(&self, id: ObserverId) -> bool {
        self.state.with_lock(|state| {
            let before = state.observers.len();
            state.observers.retain(|(observer, _)| *observer != id);
            state.observers.len() != before
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.state.with_lock(|state| state.observers.len())
    }

    pub(crate) fn is_torn_down(&self) -> bool {
        self.state.with_lock(|state| state.torn_down)
    }

    /// Null every registered cell, in registration order. Runs at most once;
    /// returns the number of cells notified.
    pub(crate) fn notify_teardown(&self) -> usize {
        let observers = self.state.with_lock(|state| {
            if state.torn_down {
                return Vec::new();
            }
            state.torn_down = true;
            std::mem::take(&mut state.observers)
        });

        for (id, cell) in &observers {
            cell.with_lock(|target| *target = None);
            tracing::trace!("Teardown observer {:?} detached", id);
        }

        observers.len()
    }
}

/// Worker-side handle to a [`ProgressIndicator`](crate::ProgressIndicator).
///
/// While the indicator exists, calls are forwarded to its channel. After the
/// indicator has been torn down, [`set_progress`](Progress::set_progress) is
/// a no-op and [`shall_abort`](Progress::shall_abort) returns true: with no one
/// left to watch or resume the operation, it counts as cancelled.
///
/// Dropping the bridge first removes it from the indicator's registry, so the
/// indicator's later teardown never touches it.
pub struct ProgressBridge {
    cell: Arc<TargetCell>,
    registration: Option<(ObserverId, Weak<TeardownRegistry>)>,
}

impl ProgressBridge {
    pub(crate) fn attach(channel: ProgressChannel, registry: &Arc<TeardownRegistry>) -> Self {
        let cell = Arc::new(Monitor::new(Some(channel)));

        match registry.register(Arc::clone(&cell)) {
            Some(id) => Self {
                cell,
                registration: Some((id, Arc::downgrade(registry))),
            },
            None => {
                tracing::debug!("Attaching to an indicator that is already torn down");
                cell.with_lock(|target| *target = None);
                Self {
                    cell,
                    registration: None,
                }
            }
        }
    }

    /// A bridge without a target, behaving like a torn-down indicator
    pub fn detached() -> Self {
        Self {
            cell: Arc::new(Monitor::new(None)),
            registration: None,
        }
    }

    /// Whether the indicator is still alive
    pub fn is_attached(&self) -> bool {
        self.cell.with_lock(|target| target.is_some())
    }

    /// Registration key, if the bridge was ever registered
    pub fn observer_id(&self) -> Option<ObserverId> {
        self.registration.as_ref().map(|(id, _)| *id)
    }

    fn target(&self) -> Option<ProgressChannel> {
        self.cell.with_lock(|target| target.clone())
    }
}

impl Progress for ProgressBridge {
    fn set_progress(&self, fraction: f64) {
        if let Some(channel) = self.target() {
            channel.set_progress(fraction);
        }
    }

    fn shall_abort(&self) -> bool {
        match self.target() {
            Some(channel) => channel.shall_abort(),
            None => true,
        }
    }
}

impl Drop for ProgressBridge {
    fn drop(&mut self) {
        self.cell.with_lock(|target| *target = None);

        if let Some((id, registry)) = self.registration.take() {
            if let Some(registry) = registry.upgrade() {
                registry.unregister(id);
            }
        }
    }
}

impl fmt::Debug for ProgressBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressBridge")
            .field("observer_id", &self.observer_id())
            .field("attached", &self.is_attached())
            .finish()
    }
}
