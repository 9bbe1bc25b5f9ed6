// ProgressIndicator - the UI-side owner of a progress channel
//
// Tearing down an indicator happens in a fixed order:
// 1. every attached bridge is detached (its cell set to None);
// 2. the channel is cancelled, so a worker already parked in shall_abort()
//    through a bridge wakes up and sees `true`.

use crate::progress::bridge::{ProgressBridge, TeardownRegistry};
use crate::progress::{ProgressChannel, ProgressState};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_INDICATOR_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique indicator identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndicatorId(u64);

impl IndicatorId {
    pub(crate) fn next() -> Self {
        Self(NEXT_INDICATOR_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Point-in-time view of an indicator, for rendering and tests
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub id: IndicatorId,
    pub operation: String,
    pub fraction: f64,
    pub state: ProgressState,
    pub pause_button_visible: bool,
    pub cancel_button_visible: bool,
}

/// Progress presentation owned by the UI.
///
/// The controller drives it through [`channel`](Self::channel) (pause, resume,
/// cancel); workers report to it through bridges obtained from
/// [`attach`](Self::attach). The indicator may be dropped at any time.
///
/// # Example
/// ```
/// use crossloop::{Progress, ProgressIndicator};
///
/// let indicator = ProgressIndicator::new("Indexing");
/// let bridge = indicator.attach();
///
/// bridge.set_progress(0.5);
/// assert_eq!(indicator.channel().fraction(), 0.5);
///
/// drop(indicator);
/// bridge.set_progress(0.9); // ignored
/// assert!(bridge.shall_abort());
/// ```
#[derive(Debug)]
pub struct ProgressIndicator {
    id: IndicatorId,
    operation: String,
    channel: ProgressChannel,
    observers: Arc<TeardownRegistry>,
    pause_button_visible: bool,
    cancel_button_visible: bool,
}

impl ProgressIndicator {
    /// Create an indicator with a plain channel
    pub fn new(operation: impl Into<String>) -> Self {
        Self::with_channel(IndicatorId::next(), operation, ProgressChannel::new())
    }

    pub(crate) fn with_channel(
        id: IndicatorId,
        operation: impl Into<String>,
        channel: ProgressChannel,
    ) -> Self {
        Self {
            id,
            operation: operation.into(),
            channel,
            observers: Arc::new(TeardownRegistry::default()),
            pause_button_visible: true,
            cancel_button_visible: true,
        }
    }

    pub fn id(&self) -> IndicatorId {
        self.id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn set_operation(&mut self, operation: impl Into<String>) {
        self.operation = operation.into();
    }

    /// Controller side of the indicator's state
    pub fn channel(&self) -> &ProgressChannel {
        &self.channel
    }

    /// Create a worker-side bridge to this indicator
    pub fn attach(&self) -> ProgressBridge {
        ProgressBridge::attach(self.channel.clone(), &self.observers)
    }

    /// Number of bridges currently attached
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn set_pause_button_visible(&mut self, visible: bool) {
        self.pause_button_visible = visible;
    }

    pub fn set_cancel_button_visible(&mut self, visible: bool) {
        self.cancel_button_visible = visible;
    }

    pub fn snapshot(&self) -> IndicatorSnapshot {
        IndicatorSnapshot {
            id: self.id,
            operation: self.operation.clone(),
            fraction: self.channel.fraction(),
            state: self.channel.state(),
            pause_button_visible: self.pause_button_visible,
            cancel_button_visible: self.cancel_button_visible,
        }
    }

    fn tear_down(&mut self) {
        let detached = self.observers.notify_teardown();
        self.channel.cancel();

        tracing::debug!(
            "Progress indicator '{}' ({:?}) torn down, {} bridge(s) detached",
            self.operation,
            self.id,
            detached
        );
    }
}

impl Drop for ProgressIndicator {
    fn drop(&mut self) {
        self.tear_down();
    }
}
