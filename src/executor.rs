// BackgroundExecutor - Runs cancellable operations off the UI thread
//
// Two event loops cooperate here:
// 1. The UI run loop, owned by the controller thread
// 2. Tokio's runtime, whose blocking pool runs the workers
//
// Workers block in shall_abort() while paused, so they always go to the
// blocking pool and never to the async worker threads.

use crate::context::ProgressContext;
use crate::progress::Progress;
use crate::report::FailureReporter;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Spawns background operations wired to the UI's progress manager.
///
/// # Example
/// ```ignore
/// let executor = BackgroundExecutor::new(runtime.handle().clone(), context);
///
/// let handle = executor.spawn_with_progress("Indexing", |progress| {
///     for i in 0..100 {
///         if progress.shall_abort() {
///             return false;
///         }
///         progress.set_progress(f64::from(i) / 100.0);
///     }
///     true
/// });
/// ```
#[derive(Clone, Debug)]
pub struct BackgroundExecutor {
    /// Handle to the tokio runtime for spawning tasks
    runtime: tokio::runtime::Handle,

    /// UI loop and progress manager handed to each operation
    context: ProgressContext,
}

impl BackgroundExecutor {
    /// Create a new BackgroundExecutor
    ///
    /// # Arguments
    /// * `runtime` - Handle to the tokio runtime whose blocking pool runs workers
    /// * `context` - UI loop and progress manager for the spawned operations
    pub fn new(runtime: tokio::runtime::Handle, context: ProgressContext) -> Self {
        Self { runtime, context }
    }

    pub fn context(&self) -> &ProgressContext {
        &self.context
    }

    /// Run `work` on the blocking pool with a progress handle for `operation`.
    ///
    /// Called from a plain thread, the progress handle is created before this
    /// returns, so the indicator already exists. Called from within a tokio
    /// runtime, where blocking on the UI loop is not allowed, the handle is
    /// created on the blocking pool before `work` starts.
    ///
    /// # Returns
    /// A join handle resolving to the closure's result
    pub fn spawn_with_progress<F, R>(&self, operation: &str, work: F) -> JoinHandle<R>
    where
        F: FnOnce(&dyn Progress) -> R + Send + 'static,
        R: Send + 'static,
    {
        let early = match tokio::runtime::Handle::try_current() {
            Ok(_) => None,
            Err(_) => Some(self.context.create_progress(operation)),
        };
        let context = self.context.clone();
        let operation = operation.to_string();

        self.runtime.spawn_blocking(move || {
            let progress = early.unwrap_or_else(|| context.create_progress(&operation));
            tracing::debug!("Operation '{}' started", operation);
            let result = work(&*progress);
            tracing::debug!("Operation '{}' finished", operation);
            result
        })
    }

    /// Like [`spawn_with_progress`](Self::spawn_with_progress), but failures
    /// are reported through `reporter` on the UI loop.
    ///
    /// # Returns
    /// A join handle resolving to `Some(value)` on success, `None` on failure
    /// or user cancellation
    pub fn spawn_reported<F, R>(
        &self,
        operation: &str,
        reporter: Arc<dyn FailureReporter>,
        work: F,
    ) -> JoinHandle<Option<R>>
    where
        F: FnOnce(&dyn Progress) -> anyhow::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let context = self.context.clone();
        self.spawn_with_progress(operation, move |progress| {
            context.catch_failures(reporter, || work(progress))
        })
    }

    /// Spawn an async task on the tokio runtime
    ///
    /// # Arguments
    /// * `future_factory` - A function that produces a Future to execute on tokio
    pub fn spawn_async<F, Fut>(&self, future_factory: F) -> JoinHandle<Fut::Output>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        self.runtime.spawn(async move { future_factory().await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{LoopThread, RunLoop};
    use crate::models::ProgressSettings;
    use crate::progress::{ProgressChannel, ProgressManager, ProgressPanel};
    use crate::report::LogFailureReporter;

    struct FixedChannelManager(ProgressChannel);

    impl ProgressManager for FixedChannelManager {
        fn create_progress(&self, _operation_name: &str) -> Box<dyn Progress> {
            Box::new(self.0.clone())
        }
    }

    #[test]
    fn test_spawn_with_progress_reports() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let ui = LoopThread::spawn("exec-ui").unwrap();
        let panel = ProgressPanel::new(ui.handle().clone(), ProgressSettings::default());
        let context = ProgressContext::new(ui.handle().clone()).with_manager(Arc::new(panel.clone()));
        let executor = BackgroundExecutor::new(rt.handle().clone(), context);

        let handle = executor.spawn_with_progress("Counting", |progress| {
            progress.set_progress(1.0);
            7
        });

        assert_eq!(rt.block_on(handle).unwrap(), 7);
        assert_eq!(panel.snapshot()[0].fraction, 1.0);
    }

    #[test]
    fn test_spawn_with_progress_from_async_task() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let ui = LoopThread::spawn("exec-async-ui").unwrap();
        let panel = ProgressPanel::new(ui.handle().clone(), ProgressSettings::default());
        let context = ProgressContext::new(ui.handle().clone()).with_manager(Arc::new(panel.clone()));
        let executor = BackgroundExecutor::new(rt.handle().clone(), context);

        let inner = executor.clone();
        let handle = executor.spawn_async(move || async move {
            inner
                .spawn_with_progress("From async", |progress| {
                    progress.set_progress(1.0);
                    3
                })
                .await
                .unwrap()
        });

        assert_eq!(rt.block_on(handle).unwrap(), 3);
        let snapshot = &panel.snapshot()[0];
        assert_eq!(snapshot.operation, "From async");
        assert_eq!(snapshot.fraction, 1.0);
    }

    #[test]
    fn test_spawn_reported_cancelled_yields_none() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let run_loop = RunLoop::with_name("exec-cancel");
        let channel = ProgressChannel::new();
        channel.cancel();
        let context = ProgressContext::new(run_loop.handle()).with_manager(Arc::new(FixedChannelManager(channel)));
        let executor = BackgroundExecutor::new(rt.handle().clone(), context);

        let handle = executor.spawn_reported("Cancelled", Arc::new(LogFailureReporter), |progress| {
            progress.checkpoint()?;
            Ok::<_, anyhow::Error>(1)
        });

        assert_eq!(rt.block_on(handle).unwrap(), None);
    }

    #[test]
    fn test_spawn_async() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let run_loop = RunLoop::with_name("exec-async");
        let executor = BackgroundExecutor::new(rt.handle().clone(), ProgressContext::new(run_loop.handle()));

        let handle = executor.spawn_async(|| async { 6 * 7 });

        assert_eq!(rt.block_on(handle).unwrap(), 42);
        rt.shutdown_timeout(std::time::Duration::from_secs(1));
    }
}
