// Type-erased unit of work queued on a run loop
//
// A Task owns the caller's closure together with the sending half of a oneshot
// channel. Running it resolves the channel with the closure's value (or its
// panic). Dropping it unrun resolves the channel with ThreadUnavailable, so a
// task can never disappear without its future being resolved.

use crate::dispatch::future::TaskFuture;
use crate::error::{DispatchError, PanicPayload};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use tokio::sync::oneshot;

/// How a task's closure finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskOutcome {
    Completed,
    Panicked,
}

trait Job: Send {
    fn run(self: Box<Self>) -> TaskOutcome;
    fn abandon(self: Box<Self>);
}

struct PromiseJob<F, R> {
    work: F,
    promise: oneshot::Sender<Result<R, DispatchError>>,
}

impl<F, R> Job for PromiseJob<F, R>
where
    F: FnOnce() -> R + Send,
    R: Send,
{
    fn run(self: Box<Self>) -> TaskOutcome {
        let Self { work, promise } = *self;

        let result = panic::catch_unwind(AssertUnwindSafe(work))
            .map_err(|payload| DispatchError::Panicked(PanicPayload::new(payload)));
        let outcome = match result {
            Ok(_) => TaskOutcome::Completed,
            Err(_) => TaskOutcome::Panicked,
        };

        // The submitter may have dropped its future; the value is then discarded.
        let _ = promise.send(result);
        outcome
    }

    fn abandon(self: Box<Self>) {
        let _ = self.promise.send(Err(DispatchError::ThreadUnavailable));
    }
}

/// A queued, not yet executed unit of work
pub(crate) struct Task {
    job: Option<Box<dyn Job>>,
}

impl Task {
    /// Wrap `work` and return it together with the future observing it
    pub(crate) fn new<F, R>(work: F) -> (Self, TaskFuture<R>)
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (promise, receiver) = oneshot::channel();
        let task = Self {
            job: Some(Box::new(PromiseJob { work, promise })),
        };
        (task, TaskFuture::new(receiver))
    }

    /// Execute the closure on the current thread and resolve the future
    pub(crate) fn run(mut self) -> TaskOutcome {
        match self.job.take() {
            Some(job) => job.run(),
            None => TaskOutcome::Completed,
        }
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        if let Some(job) = self.job.take() {
            tracing::debug!("Dropping unexecuted task, resolving it as ThreadUnavailable");
            job.abandon();
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("pending", &self.job.is_some())
            .finish()
    }
}
