// LoopThread - a dedicated OS thread running its own RunLoop
//
// The thread starts running its loop immediately. Dropping the LoopThread asks
// the loop to quit after the work already queued and joins the thread.

use crate::dispatch::run_loop::{RunLoop, RunLoopHandle};
use std::io;
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;

/// A named thread that processes work posted to its [`RunLoopHandle`].
///
/// # Example
/// ```
/// use crossloop::LoopThread;
///
/// let worker = LoopThread::spawn("io-loop").unwrap();
/// let answer = worker.handle().post_sync(|| 40 + 2).unwrap();
/// assert_eq!(answer, 42);
/// ```
#[derive(Debug)]
pub struct LoopThread {
    handle: RunLoopHandle,
    join_handle: Option<JoinHandle<()>>,
}

impl LoopThread {
    /// Spawn a thread named `name` and start its run loop.
    ///
    /// Returns once the loop exists, so the handle is immediately usable.
    pub fn spawn(name: impl Into<String>) -> io::Result<Self> {
        let name = name.into();
        let (ready_tx, ready_rx) = oneshot::channel();

        let loop_name = name.clone();
        let join_handle = thread::Builder::new().name(name.clone()).spawn(move || {
            let mut run_loop = RunLoop::with_name(loop_name);
            if ready_tx.send(run_loop.handle()).is_err() {
                return;
            }
            run_loop.run();
        })?;

        let handle = ready_rx.blocking_recv().map_err(|_| {
            io::Error::other(format!("loop thread '{}' exited before starting its loop", name))
        })?;

        tracing::debug!("Loop thread '{}' started", name);

        Ok(Self {
            handle,
            join_handle: Some(join_handle),
        })
    }

    /// Handle for posting work to this thread
    pub fn handle(&self) -> &RunLoopHandle {
        &self.handle
    }
}

impl Drop for LoopThread {
    fn drop(&mut self) {
        self.handle.quit();

        let Some(join_handle) = self.join_handle.take() else {
            return;
        };

        if self.handle.is_current() {
            // Dropped from one of its own tasks: the loop exits after this task
            // returns, joining here would wait on ourselves.
            tracing::warn!(
                "Loop thread '{}' dropped from its own thread; not joining",
                self.handle.name()
            );
            return;
        }

        if join_handle.join().is_err() {
            tracing::warn!("Loop thread '{}' panicked", self.handle.name());
        }
    }
}
