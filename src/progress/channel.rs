// ProgressChannel - shared pause/cancel state between workers and a controller
//
// The pause and cancel flags live in one Monitor. The reported fraction is kept
// outside it in an atomic, so reporting progress never contends with a worker
// parked in shall_abort().

use crate::monitor::Monitor;
use crate::progress::{Progress, ProgressState, ProgressView};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Resolution of the stored progress fraction (1.0 == `PROGRESS_SCALE`)
pub const PROGRESS_SCALE: u32 = 10_000;

/// Clamp a reported fraction into `[0, 1]`; NaN counts as no progress.
pub fn normalize_fraction(fraction: f64) -> f64 {
    if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    }
}

fn to_units(fraction: f64) -> u32 {
    // Already clamped, so the product fits in u32.
    (fraction * f64::from(PROGRESS_SCALE)).round() as u32
}

#[derive(Debug, Default)]
struct ChannelFlags {
    cancelled: bool,
    paused: bool,
}

impl ChannelFlags {
    fn state(&self) -> ProgressState {
        if self.cancelled {
            ProgressState::Cancelled
        } else if self.paused {
            ProgressState::Paused
        } else {
            ProgressState::Running
        }
    }
}

struct ChannelInner {
    flags: Monitor<ChannelFlags>,
    units: AtomicU32,
    view: Option<Arc<dyn ProgressView>>,
}

/// Thread-safe progress state with pause/resume and cancellation.
///
/// Clones share the same state: hand one clone to the worker and keep another
/// for the controller.
///
/// # State machine
///
/// ```text
/// Running --pause(true)--> Paused --pause(false)--> Running
/// Running|Paused --cancel()--> Cancelled (terminal)
/// ```
///
/// `cancel()` also clears the pause flag, so a worker blocked in
/// [`shall_abort`](Progress::shall_abort) wakes up and sees the cancellation.
///
/// # Example
/// ```
/// use crossloop::{Progress, ProgressChannel, ProgressState};
///
/// let channel = ProgressChannel::new();
/// let worker_side = channel.clone();
///
/// worker_side.set_progress(0.25);
/// assert!(!worker_side.shall_abort());
///
/// channel.cancel();
/// assert!(worker_side.shall_abort());
/// assert_eq!(channel.state(), ProgressState::Cancelled);
/// ```
#[derive(Clone)]
pub struct ProgressChannel {
    inner: Arc<ChannelInner>,
}

impl ProgressChannel {
    /// Create a channel without a presentation
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create a channel that forwards every fraction change to `view`
    pub fn with_view(view: Arc<dyn ProgressView>) -> Self {
        Self::build(Some(view))
    }

    fn build(view: Option<Arc<dyn ProgressView>>) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                flags: Monitor::new(ChannelFlags::default()),
                units: AtomicU32::new(0),
                view,
            }),
        }
    }

    /// Pause (`true`) or resume (`false`) the operation.
    ///
    /// Has no effect once the channel is cancelled. Wakes every waiter.
    pub fn pause(&self, pause: bool) {
        let changed = self.inner.flags.update(|flags| {
            if flags.cancelled || flags.paused == pause {
                return false;
            }
            flags.paused = pause;
            true
        });

        if changed {
            tracing::debug!("Progress channel {}", if pause { "paused" } else { "resumed" });
        }
    }

    /// Equivalent to `pause(false)`
    pub fn resume(&self) {
        self.pause(false);
    }

    /// Cancel the operation and release paused workers.
    ///
    /// Returns true on the call that performed the cancellation; later calls
    /// are no-ops returning false.
    pub fn cancel(&self) -> bool {
        let first = self.inner.flags.update(|flags| {
            let first = !flags.cancelled;
            flags.paused = false;
            flags.cancelled = true;
            first
        });

        if first {
            tracing::debug!("Progress channel cancelled");
        }
        first
    }

    /// Current state, read under the lock
    pub fn state(&self) -> ProgressState {
        self.inner.flags.with_lock(|flags| flags.state())
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == ProgressState::Cancelled
    }

    pub fn is_paused(&self) -> bool {
        self.state() == ProgressState::Paused
    }

    /// Last reported fraction, in `[0, 1]`
    pub fn fraction(&self) -> f64 {
        f64::from(self.inner.units.load(Ordering::Relaxed)) / f64::from(PROGRESS_SCALE)
    }

    /// True if both handles share the same state
    pub fn ptr_eq(&self, other: &ProgressChannel) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Progress for ProgressChannel {
    fn set_progress(&self, fraction: f64) {
        let fraction = normalize_fraction(fraction);
        let units = to_units(fraction);

        let previous = self.inner.units.swap(units, Ordering::Relaxed);
        if previous != units {
            if let Some(view) = &self.inner.view {
                view.show_progress(fraction);
            }
        }
    }

    fn shall_abort(&self) -> bool {
        self.inner
            .flags
            .wait_while(|flags| flags.paused && !flags.cancelled, |flags| flags.cancelled)
    }
}

impl Default for ProgressChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProgressChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressChannel")
            .field("state", &self.state())
            .field("fraction", &self.fraction())
            .field("has_view", &self.inner.view.is_some())
            .finish()
    }
}
