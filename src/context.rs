// ProgressContext - the explicitly passed wiring between workers and the UI
//
// Holds the UI loop handle and, optionally, the progress manager. Whatever
// spawns workers receives a context instead of reaching for globals.

use crate::dispatch::{InvokeMode, RunLoopHandle, TaskFuture};
use crate::error::DispatchError;
use crate::progress::{self, NullProgress, Progress, ProgressManager};
use crate::report::{FailureReporter, report_failure};
use std::fmt;
use std::sync::Arc;

/// UI loop plus progress manager, cheap to clone and pass to workers.
///
/// # Example
/// ```
/// use crossloop::{Progress, ProgressContext, RunLoop};
///
/// let run_loop = RunLoop::with_name("ui");
/// let context = ProgressContext::new(run_loop.handle());
///
/// // No manager registered: progress is discarded and never aborts.
/// let progress = context.create_progress("Loading");
/// assert!(!progress.shall_abort());
/// ```
#[derive(Clone)]
pub struct ProgressContext {
    ui: RunLoopHandle,
    manager: Option<Arc<dyn ProgressManager>>,
}

impl ProgressContext {
    /// Create a context without a progress manager
    pub fn new(ui: RunLoopHandle) -> Self {
        Self { ui, manager: None }
    }

    /// Set the progress manager used by [`create_progress`](Self::create_progress)
    pub fn with_manager(mut self, manager: Arc<dyn ProgressManager>) -> Self {
        self.manager = Some(manager);
        self
    }

    /// Create a context using the manager currently registered process-wide
    pub fn from_global(ui: RunLoopHandle) -> Self {
        Self {
            ui,
            manager: progress::global_manager(),
        }
    }

    /// Handle of the UI loop
    pub fn ui(&self) -> &RunLoopHandle {
        &self.ui
    }

    pub fn manager(&self) -> Option<&Arc<dyn ProgressManager>> {
        self.manager.as_ref()
    }

    /// Create a progress handle for `operation_name`.
    ///
    /// Falls back to [`NullProgress`] when no manager is set.
    pub fn create_progress(&self, operation_name: &str) -> Box<dyn Progress> {
        match &self.manager {
            Some(manager) => manager.create_progress(operation_name),
            None => {
                tracing::debug!("No progress manager; '{}' runs without progress", operation_name);
                Box::new(NullProgress)
            }
        }
    }

    /// Post `work` to the UI loop
    pub fn invoke_in_ui<F, R>(&self, work: F, mode: InvokeMode) -> TaskFuture<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.ui.post(work, mode)
    }

    /// Run `work` on the UI loop and wait for its result
    pub fn invoke_in_ui_sync<F, R>(&self, work: F) -> Result<R, DispatchError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.ui.post_sync(work)
    }

    /// Run `work`, reporting its failure through `reporter` on the UI loop.
    ///
    /// Returns `None` on failure, including user cancellation (which is not
    /// reported).
    pub fn catch_failures<T, F>(&self, reporter: Arc<dyn FailureReporter>, work: F) -> Option<T>
    where
        F: FnOnce() -> anyhow::Result<T>,
    {
        match work() {
            Ok(value) => Some(value),
            Err(error) => {
                report_failure(&self.ui, reporter, &error);
                None
            }
        }
    }
}

impl fmt::Debug for ProgressContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressContext")
            .field("ui", &self.ui)
            .field("has_manager", &self.manager.is_some())
            .finish()
    }
}
