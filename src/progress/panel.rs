// ProgressPanel - a ProgressManager that keeps its indicators on the UI loop
//
// Indicators are created and destroyed on the UI run loop (through post_sync,
// which runs inline when the caller already is the UI thread). Workers only
// ever hold bridges, so closing an indicator from the UI while a worker is
// mid-loop is safe. Changes are published on a tokio broadcast channel, the
// same way the application state manager publishes its changes.

use crate::dispatch::RunLoopHandle;
use crate::error::DispatchError;
use crate::models::ProgressSettings;
use crate::monitor::Monitor;
use crate::progress::indicator::{IndicatorId, IndicatorSnapshot, ProgressIndicator};
use crate::progress::{Progress, ProgressBridge, ProgressChannel, ProgressManager, ProgressState, ProgressView};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Events published by a [`ProgressPanel`]
#[derive(Clone, Debug, PartialEq)]
pub enum PanelEvent {
    /// An indicator was created for an operation
    Added { id: IndicatorId, operation: String },

    /// A worker reported a new fraction
    ProgressChanged { id: IndicatorId, fraction: f64 },

    /// The controller paused, resumed or cancelled an operation
    StateChanged { id: IndicatorId, state: ProgressState },

    /// The indicator was closed; its workers now see cancellation
    Removed { id: IndicatorId },
}

// Publishes the events of one indicator. Once closed it stays silent, so no
// event for an id can follow its `Removed`, even from a worker that still
// holds a clone of the channel.
struct PanelView {
    id: IndicatorId,
    events: broadcast::Sender<PanelEvent>,
    closed: Monitor<bool>,
}

impl PanelView {
    fn publish(&self, event: PanelEvent) {
        self.closed.with_lock(|closed| {
            if !*closed {
                // No subscribers is fine.
                let _ = self.events.send(event);
            }
        });
    }

    fn close(&self) {
        self.closed.with_lock(|closed| {
            if !std::mem::replace(closed, true) {
                let _ = self.events.send(PanelEvent::Removed { id: self.id });
            }
        });
    }
}

impl ProgressView for PanelView {
    fn show_progress(&self, fraction: f64) {
        self.publish(PanelEvent::ProgressChanged { id: self.id, fraction });
    }
}

struct PanelEntry {
    indicator: ProgressIndicator,
    view: Arc<PanelView>,
}

struct PanelInner {
    ui: RunLoopHandle,
    indicators: Monitor<IndexMap<IndicatorId, PanelEntry>>,
    events: broadcast::Sender<PanelEvent>,
    settings: ProgressSettings,
}

/// Container of progress indicators, one per running operation.
///
/// Cloning is cheap; clones share the same indicators.
///
/// # Usage
///
/// - Register it as the [`ProgressManager`] of a
///   [`ProgressContext`](crate::ProgressContext) so workers get bridges to
///   freshly created indicators.
/// - Drive operations from the controller with [`pause`](Self::pause),
///   [`cancel`](Self::cancel) and [`close`](Self::close).
/// - Render from [`snapshot`](Self::snapshot) or [`subscribe`](Self::subscribe).
#[derive(Clone)]
pub struct ProgressPanel {
    inner: Arc<PanelInner>,
}

impl ProgressPanel {
    /// Create a panel whose indicators live on the `ui` run loop
    pub fn new(ui: RunLoopHandle, settings: ProgressSettings) -> Self {
        let (events, _) = broadcast::channel(100);
        Self {
            inner: Arc::new(PanelInner {
                ui,
                indicators: Monitor::new(IndexMap::new()),
                events,
                settings,
            }),
        }
    }

    /// Subscribe to future panel events
    pub fn subscribe(&self) -> broadcast::Receiver<PanelEvent> {
        self.inner.events.subscribe()
    }

    /// Create an indicator on the UI loop and return a bridge to it.
    ///
    /// Blocks until the UI loop has created the indicator (inline when called
    /// from the UI thread).
    pub fn open(&self, operation_name: &str) -> Result<ProgressBridge, DispatchError> {
        let inner = Arc::clone(&self.inner);
        let operation = operation_name.to_string();
        self.inner.ui.post_sync(move || inner.insert(operation))
    }

    /// Indicators in creation order
    pub fn snapshot(&self) -> Vec<IndicatorSnapshot> {
        self.inner
            .indicators
            .with_lock(|indicators| indicators.values().map(|entry| entry.indicator.snapshot()).collect())
    }

    /// Number of open indicators
    pub fn len(&self) -> usize {
        self.inner.indicators.with_lock(|indicators| indicators.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First open indicator for `operation`
    pub fn find(&self, operation: &str) -> Option<IndicatorId> {
        self.inner.indicators.with_lock(|indicators| {
            indicators
                .values()
                .map(|entry| &entry.indicator)
                .find(|indicator| indicator.operation() == operation)
                .map(ProgressIndicator::id)
        })
    }

    /// Pause or resume an operation; false if the indicator is gone
    pub fn pause(&self, id: IndicatorId, pause: bool) -> bool {
        let Some((channel, view)) = self.channel(id) else {
            return false;
        };
        channel.pause(pause);
        publish_state(&view, channel.state());
        true
    }

    /// Cancel an operation; false if the indicator is gone
    pub fn cancel(&self, id: IndicatorId) -> bool {
        let Some((channel, view)) = self.channel(id) else {
            return false;
        };
        if channel.cancel() {
            publish_state(&view, ProgressState::Cancelled);
        }
        true
    }

    /// Destroy an indicator on the UI loop.
    ///
    /// Returns whether an indicator was removed.
    pub fn close(&self, id: IndicatorId) -> Result<bool, DispatchError> {
        let inner = Arc::clone(&self.inner);
        self.inner.ui.post_sync(move || inner.remove(id))
    }

    /// Destroy every indicator on the UI loop; returns how many were removed
    pub fn close_all(&self) -> Result<usize, DispatchError> {
        let inner = Arc::clone(&self.inner);
        self.inner.ui.post_sync(move || {
            let ids: Vec<IndicatorId> = inner.indicators.with_lock(|indicators| indicators.keys().copied().collect());
            ids.into_iter().filter(|id| inner.remove(*id)).count()
        })
    }

    fn channel(&self, id: IndicatorId) -> Option<(ProgressChannel, Arc<PanelView>)> {
        self.inner.indicators.with_lock(|indicators| {
            indicators
                .get(&id)
                .map(|entry| (entry.indicator.channel().clone(), Arc::clone(&entry.view)))
        })
    }
}

fn publish_state(view: &PanelView, state: ProgressState) {
    tracing::info!("Operation {:?} is now {:?}", view.id, state);
    view.publish(PanelEvent::StateChanged { id: view.id, state });
}

impl PanelInner {
    fn insert(&self, operation: String) -> ProgressBridge {
        let id = IndicatorId::next();
        let view = Arc::new(PanelView {
            id,
            events: self.events.clone(),
            closed: Monitor::new(false),
        });

        let channel = ProgressChannel::with_view(Arc::clone(&view) as Arc<dyn ProgressView>);
        let mut indicator = ProgressIndicator::with_channel(id, operation.clone(), channel);
        indicator.set_pause_button_visible(self.settings.show_pause_button);
        indicator.set_cancel_button_visible(self.settings.show_cancel_button);
        let bridge = indicator.attach();

        // Added goes out before the entry is visible, so it precedes every
        // other event for this id.
        tracing::info!("Progress indicator opened for '{}' ({:?})", operation, id);
        view.publish(PanelEvent::Added { id, operation });
        self.indicators
            .with_lock(|indicators| indicators.insert(id, PanelEntry { indicator, view }));

        bridge
    }

    fn remove(&self, id: IndicatorId) -> bool {
        // shift_remove keeps the remaining indicators in creation order.
        let removed = self.indicators.with_lock(|indicators| indicators.shift_remove(&id));

        match removed {
            Some(PanelEntry { indicator, view }) => {
                // Tear down outside the panel lock.
                drop(indicator);
                tracing::info!("Progress indicator {:?} closed", id);
                view.close();
                true
            }
            None => false,
        }
    }
}

impl ProgressManager for ProgressPanel {
    fn create_progress(&self, operation_name: &str) -> Box<dyn Progress> {
        match self.open(operation_name) {
            Ok(bridge) => Box::new(bridge),
            Err(error) => {
                // No UI to show or resume the operation: behave like a closed indicator.
                tracing::warn!(
                    "Could not open progress indicator for '{}': {}",
                    operation_name,
                    error
                );
                Box::new(ProgressBridge::detached())
            }
        }
    }
}

impl fmt::Debug for ProgressPanel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressPanel")
            .field("ui", &self.inner.ui)
            .field("indicators", &self.len())
            .finish()
    }
}
