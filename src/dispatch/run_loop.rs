// RunLoop - a thread-owned FIFO queue of work
//
// The thread that creates a RunLoop owns it and drives it with `run()` or
// `process_pending()`. Any thread may hold a RunLoopHandle and post closures
// to it. The handle also carries the owning thread's identity, which is what
// makes the `Auto` fast path possible.

use crate::dispatch::future::TaskFuture;
use crate::dispatch::task::{Task, TaskOutcome};
use crate::error::DispatchError;
use crate::metrics::DispatchMetrics;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};
use tokio::sync::mpsc;

/// How [`RunLoopHandle::post`] schedules a closure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvokeMode {
    /// Run synchronously when already on the loop's thread, otherwise queue.
    #[default]
    Auto,

    /// Always append to the end of the loop queue, even from the loop's thread.
    Queued,
}

enum Message {
    Run(Task),
    Quit,
}

struct LoopShared {
    name: String,
    thread_id: ThreadId,
    sender: mpsc::UnboundedSender<Message>,
    stopped: AtomicBool,
    metrics: DispatchMetrics,
}

impl LoopShared {
    fn execute(&self, task: Task) {
        if task.run() == TaskOutcome::Panicked {
            self.metrics.record_panicked();
            tracing::warn!("Task on run loop '{}' panicked", self.name);
        }
    }
}

/// The owning side of a run loop.
///
/// A `RunLoop` is bound to the thread that created it and cannot be sent to
/// another thread. Once it has stopped (after [`RunLoopHandle::quit`] or when
/// it is dropped) every queued and future task resolves with
/// [`DispatchError::ThreadUnavailable`].
///
/// # Example
/// ```
/// use crossloop::{InvokeMode, RunLoop};
///
/// let mut run_loop = RunLoop::with_name("ui");
/// let handle = run_loop.handle();
///
/// let future = handle.post(|| 2 + 2, InvokeMode::Queued);
/// assert_eq!(run_loop.process_pending(), 1);
/// assert_eq!(future.wait().unwrap(), 4);
/// ```
pub struct RunLoop {
    shared: Arc<LoopShared>,
    receiver: mpsc::UnboundedReceiver<Message>,
    _not_send: PhantomData<*const ()>,
}

impl RunLoop {
    /// Create a loop owned by the current thread, named after the thread
    pub fn new() -> Self {
        let name = thread::current().name().unwrap_or("unnamed").to_string();
        Self::with_name(name)
    }

    /// Create a loop owned by the current thread with an explicit name
    pub fn with_name(name: impl Into<String>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let shared = Arc::new(LoopShared {
            name: name.into(),
            thread_id: thread::current().id(),
            sender,
            stopped: AtomicBool::new(false),
            metrics: DispatchMetrics::new(),
        });

        tracing::debug!("Run loop '{}' created on {:?}", shared.name, shared.thread_id);

        Self {
            shared,
            receiver,
            _not_send: PhantomData,
        }
    }

    /// Get a cloneable handle for posting work to this loop
    pub fn handle(&self) -> RunLoopHandle {
        RunLoopHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Process tasks in FIFO order until [`RunLoopHandle::quit`] is called.
    ///
    /// Returns immediately if the loop has already stopped.
    ///
    /// # Panics
    /// Panics when called from within an asynchronous execution context.
    pub fn run(&mut self) {
        if self.is_stopped() {
            return;
        }

        tracing::info!("Run loop '{}' started", self.shared.name);

        while let Some(message) = self.receiver.blocking_recv() {
            if !self.dispatch(message) {
                break;
            }
        }

        self.stop();
    }

    /// Run the tasks queued when the call starts, without blocking.
    ///
    /// Work those tasks post to this loop waits for the next call. Returns the
    /// number of tasks executed. A pending quit request stops the loop.
    pub fn process_pending(&mut self) -> usize {
        let queued = self.receiver.len();
        let mut processed = 0;

        for _ in 0..queued {
            let Ok(message) = self.receiver.try_recv() else {
                break;
            };
            if self.dispatch(message) {
                processed += 1;
            } else {
                self.stop();
                break;
            }
        }

        processed
    }

    /// Whether the loop has stopped accepting work
    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    fn dispatch(&self, message: Message) -> bool {
        match message {
            Message::Run(task) => {
                self.shared.execute(task);
                self.shared.metrics.record_queued();
                true
            }
            Message::Quit => false,
        }
    }

    fn stop(&mut self) {
        if self.shared.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        // Closing first makes every later send fail, so nothing can slip in
        // behind the drain below.
        self.receiver.close();

        let mut abandoned = 0;
        while let Ok(message) = self.receiver.try_recv() {
            if let Message::Run(task) = message {
                drop(task);
                abandoned += 1;
            }
        }

        if abandoned > 0 {
            tracing::warn!(
                "Run loop '{}' stopped with {} pending task(s); resolved as ThreadUnavailable",
                self.shared.name,
                abandoned
            );
            self.shared.metrics.record_abandoned(abandoned);
        }

        tracing::info!("Run loop '{}' stopped", self.shared.name);
        self.shared.metrics.log_summary(&self.shared.name);
    }
}

impl Default for RunLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RunLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for RunLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunLoop")
            .field("name", &self.shared.name)
            .field("thread_id", &self.shared.thread_id)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Posting identity of a [`RunLoop`]; cheap to clone and `Send + Sync`.
#[derive(Clone)]
pub struct RunLoopHandle {
    shared: Arc<LoopShared>,
}

impl RunLoopHandle {
    /// Post `work` to the loop and return a future for its outcome.
    ///
    /// With [`InvokeMode::Auto`] and a caller already on the loop's thread the
    /// closure runs before `post` returns. Otherwise it is queued behind all
    /// work posted earlier. If the loop has stopped, the future resolves with
    /// [`DispatchError::ThreadUnavailable`].
    pub fn post<F, R>(&self, work: F, mode: InvokeMode) -> TaskFuture<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (task, future) = Task::new(work);
        self.shared.metrics.record_posted();

        if self.is_stopped() {
            self.abandon(task);
            return future;
        }

        if mode == InvokeMode::Auto && self.is_current() {
            self.shared.execute(task);
            self.shared.metrics.record_inline();
            return future;
        }

        if let Err(mpsc::error::SendError(message)) = self.shared.sender.send(Message::Run(task)) {
            if let Message::Run(task) = message {
                self.abandon(task);
            }
        }

        future
    }

    /// Always queue `work`, even from the loop's own thread
    pub fn post_async<F, R>(&self, work: F) -> TaskFuture<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.post(work, InvokeMode::Queued)
    }

    /// Run `work` on the loop and block until it has finished.
    ///
    /// From the loop's own thread the closure runs inline, so this never
    /// deadlocks on re-entry.
    pub fn post_sync<F, R>(&self, work: F) -> Result<R, DispatchError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.post(work, InvokeMode::Auto).wait()
    }

    /// Ask the loop to stop after the work queued so far.
    ///
    /// Tasks posted after this call resolve with `ThreadUnavailable`.
    pub fn quit(&self) {
        if self.shared.sender.send(Message::Quit).is_err() {
            tracing::debug!("Run loop '{}' already stopped", self.shared.name);
        }
    }

    /// True when called from the thread that owns the loop
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.shared.thread_id
    }

    /// Whether the loop has stopped accepting work
    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    /// Identity of the owning thread
    pub fn thread_id(&self) -> ThreadId {
        self.shared.thread_id
    }

    /// Name given to the loop at creation
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Dispatch counters for this loop
    pub fn metrics(&self) -> &DispatchMetrics {
        &self.shared.metrics
    }

    /// True if both handles refer to the same loop
    pub fn same_loop(&self, other: &RunLoopHandle) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    fn abandon(&self, task: Task) {
        tracing::debug!(
            "Run loop '{}' is not processing work; task resolved as ThreadUnavailable",
            self.shared.name
        );
        self.shared.metrics.record_abandoned(1);
        drop(task);
    }
}

impl fmt::Debug for RunLoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunLoopHandle")
            .field("name", &self.shared.name)
            .field("thread_id", &self.shared.thread_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_auto_from_owner_thread_runs_inline() {
        let run_loop = RunLoop::with_name("inline");
        let handle = run_loop.handle();

        let future = handle.post(|| 42, InvokeMode::Auto);

        // Resolved before post returned; nothing was queued.
        assert_eq!(future.try_wait().ok().unwrap().unwrap(), 42);
        assert_eq!(handle.metrics().executed_inline.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_queued_from_owner_thread_waits_for_processing() {
        let mut run_loop = RunLoop::with_name("queued");
        let handle = run_loop.handle();

        let future = handle.post(|| 42, InvokeMode::Queued);
        let future = future.try_wait().unwrap_err();

        assert_eq!(run_loop.process_pending(), 1);
        assert_eq!(future.try_wait().ok().unwrap().unwrap(), 42);
    }

    #[test]
    fn test_queued_tasks_run_in_fifo_order() {
        let mut run_loop = RunLoop::with_name("fifo");
        let handle = run_loop.handle();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let order = Arc::clone(&order);
            let _ = handle.post_async(move || order.lock().unwrap().push(i));
        }
        run_loop.process_pending();

        assert_eq!(*order.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_process_pending_leaves_reposted_work_for_next_call() {
        fn repost(handle: RunLoopHandle, remaining: u32, runs: Arc<AtomicUsize>) {
            runs.fetch_add(1, Ordering::SeqCst);
            if remaining > 0 {
                let next = handle.clone();
                let _ = handle.post_async(move || repost(next, remaining - 1, runs));
            }
        }

        let mut run_loop = RunLoop::with_name("repost");
        let handle = run_loop.handle();
        let runs = Arc::new(AtomicUsize::new(0));

        let _ = handle.post_async({
            let handle = handle.clone();
            let runs = Arc::clone(&runs);
            move || repost(handle, 1000, runs)
        });

        assert_eq!(run_loop.process_pending(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(run_loop.process_pending(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_post_sync_reentrant_from_loop_task() {
        let mut run_loop = RunLoop::with_name("reentrant");
        let handle = run_loop.handle();

        let inner_handle = handle.clone();
        let future = handle.post_async(move || inner_handle.post_sync(|| 7).unwrap() * 6);
        run_loop.process_pending();

        assert_eq!(future.wait().unwrap(), 42);
    }

    #[test]
    fn test_quit_abandons_tasks_posted_behind_it() {
        let mut run_loop = RunLoop::with_name("quit");
        let handle = run_loop.handle();

        let before = handle.post_async(|| 1);
        handle.quit();
        let behind = handle.post_async(|| 2);

        assert_eq!(run_loop.process_pending(), 1);
        assert!(run_loop.is_stopped());
        assert_eq!(before.wait().unwrap(), 1);
        assert!(behind.wait().unwrap_err().is_thread_unavailable());
    }

    #[test]
    fn test_post_after_stop_resolves_thread_unavailable() {
        let run_loop = RunLoop::with_name("dropped");
        let handle = run_loop.handle();
        drop(run_loop);

        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = Arc::clone(&ran);
        let result = handle.post_sync(move || ran_clone.fetch_add(1, Ordering::SeqCst));

        assert!(result.unwrap_err().is_thread_unavailable());
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(handle.metrics().abandoned.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_panicking_task_does_not_stop_loop() {
        let mut run_loop = RunLoop::with_name("panics");
        let handle = run_loop.handle();

        let bad = handle.post_async(|| -> i32 { panic!("bad task") });
        let good = handle.post_async(|| 5);
        run_loop.process_pending();

        assert!(matches!(bad.wait(), Err(DispatchError::Panicked(_))));
        assert_eq!(good.wait().unwrap(), 5);
        assert_eq!(handle.metrics().panicked.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_handle_identity() {
        let run_loop = RunLoop::with_name("identity");
        let handle = run_loop.handle();

        assert!(handle.is_current());
        assert_eq!(handle.name(), "identity");
        assert!(handle.same_loop(&run_loop.handle()));

        let other = RunLoop::with_name("other");
        assert!(!handle.same_loop(&other.handle()));

        let remote = handle.clone();
        let is_current_elsewhere = std::thread::spawn(move || remote.is_current()).join().unwrap();
        assert!(!is_current_elsewhere);
    }
}
