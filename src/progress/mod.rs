//! Progress reporting and cooperative cancellation.
//!
//! Workers see progress through the [`Progress`] trait: they report a fraction
//! with [`Progress::set_progress`] and poll [`Progress::shall_abort`] inside
//! their loops. A paused worker is simply a worker blocked inside
//! `shall_abort`.
//!
//! - [`ProgressChannel`] is the shared, lock-guarded state (running, paused,
//!   cancelled) between one or more workers and a controller.
//! - [`ProgressIndicator`] is the UI-side object owning a channel. Its lifetime
//!   is independent of the workers reporting to it.
//! - [`ProgressBridge`] is the worker's handle to an indicator. Once the
//!   indicator is torn down, updates through the bridge are ignored and
//!   `shall_abort` returns true.
//! - [`ProgressManager`] creates progress handles by operation name;
//!   [`ProgressPanel`] is the implementation that keeps indicators on the UI
//!   run loop, and [`NullProgress`] is the fallback when no manager exists.

pub mod bridge;
pub mod channel;
pub mod indicator;
pub mod manager;
pub mod panel;

pub use bridge::{ObserverId, ProgressBridge};
pub use channel::{PROGRESS_SCALE, ProgressChannel, normalize_fraction};
pub use indicator::{IndicatorId, IndicatorSnapshot, ProgressIndicator};
pub use manager::{NullProgress, ProgressManager, create_progress, global_manager, set_global_manager};
pub use panel::{PanelEvent, ProgressPanel};

use crate::error::Cancelled;
use std::sync::Arc;

/// Lifecycle of a progress channel.
///
/// `Cancelled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgressState {
    Running,
    Paused,
    Cancelled,
}

/// Worker-facing progress capability.
///
/// Implementations must be callable from any thread.
pub trait Progress: Send + Sync {
    /// Report completion as a fraction in `[0, 1]`. Never blocks.
    fn set_progress(&self, fraction: f64);

    /// Whether the worker should stop.
    ///
    /// Blocks while the operation is paused. Returns true once the operation is
    /// cancelled; cancellation is permanent.
    fn shall_abort(&self) -> bool;

    /// [`shall_abort`](Self::shall_abort) as a `Result`, for use with `?`
    fn checkpoint(&self) -> Result<(), Cancelled> {
        if self.shall_abort() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

impl<P: Progress + ?Sized> Progress for Box<P> {
    fn set_progress(&self, fraction: f64) {
        (**self).set_progress(fraction);
    }

    fn shall_abort(&self) -> bool {
        (**self).shall_abort()
    }
}

impl<P: Progress + ?Sized> Progress for Arc<P> {
    fn set_progress(&self, fraction: f64) {
        (**self).set_progress(fraction);
    }

    fn shall_abort(&self) -> bool {
        (**self).shall_abort()
    }
}

/// Presentation fed by a [`ProgressChannel`].
///
/// Called on the reporting worker's thread; implementations that touch
/// thread-bound UI state must marshal the update themselves (for example with
/// [`RunLoopHandle::post_async`](crate::RunLoopHandle::post_async)).
pub trait ProgressView: Send + Sync {
    fn show_progress(&self, fraction: f64);
}
