// TaskFuture - the observing half of a dispatched task

use crate::error::DispatchError;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot::{self, error::TryRecvError};

/// Resolves exactly once to the dispatched closure's value or its failure.
///
/// A `TaskFuture` can be consumed three ways:
/// - [`wait`](Self::wait) blocks the calling thread (not usable inside an async task);
/// - [`try_wait`](Self::try_wait) polls without blocking and hands the future
///   back while the task is still pending;
/// - `.await` from async code.
///
/// Dropping it is allowed: the task still runs, its result is discarded.
#[must_use = "dropping a TaskFuture discards the task's result"]
pub struct TaskFuture<R> {
    receiver: oneshot::Receiver<Result<R, DispatchError>>,
}

impl<R> TaskFuture<R> {
    pub(crate) fn new(receiver: oneshot::Receiver<Result<R, DispatchError>>) -> Self {
        Self { receiver }
    }

    /// Block the current thread until the task has resolved.
    ///
    /// # Panics
    /// Panics when called from within an asynchronous execution context; await
    /// the future there instead.
    pub fn wait(self) -> Result<R, DispatchError> {
        self.receiver
            .blocking_recv()
            .unwrap_or(Err(DispatchError::ThreadUnavailable))
    }

    /// Take the outcome if it is already available.
    ///
    /// Returns the future itself as the error while the task is pending, so
    /// an outcome can never be observed twice.
    ///
    /// # Example
    /// ```
    /// use crossloop::{InvokeMode, RunLoop};
    ///
    /// let mut run_loop = RunLoop::with_name("poll");
    /// let future = run_loop.handle().post(|| "done", InvokeMode::Queued);
    ///
    /// let future = future.try_wait().unwrap_err();
    /// run_loop.process_pending();
    /// assert_eq!(future.try_wait().unwrap().unwrap(), "done");
    /// ```
    pub fn try_wait(mut self) -> Result<Result<R, DispatchError>, Self> {
        match self.receiver.try_recv() {
            Ok(result) => Ok(result),
            Err(TryRecvError::Empty) => Err(self),
            // Closed before anything was sent: the task was dropped unrun.
            Err(TryRecvError::Closed) => Ok(Err(DispatchError::ThreadUnavailable)),
        }
    }
}

impl<R> Future for TaskFuture<R> {
    type Output = Result<R, DispatchError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(DispatchError::ThreadUnavailable)))
    }
}

impl<R> fmt::Debug for TaskFuture<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFuture").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_wait_before_and_after_resolution() {
        let (tx, rx) = oneshot::channel();
        let future = TaskFuture::new(rx);

        let future = future.try_wait().unwrap_err();
        tx.send(Ok(5)).unwrap();
        assert_eq!(future.try_wait().unwrap().unwrap(), 5);
    }

    #[test]
    fn test_pending_future_can_still_be_waited() {
        let (tx, rx) = oneshot::channel();
        let future = TaskFuture::new(rx);

        let future = future.try_wait().unwrap_err();
        let sender = std::thread::spawn(move || tx.send(Ok("late")).unwrap());

        assert_eq!(future.wait().unwrap(), "late");
        sender.join().unwrap();
    }

    #[tokio::test]
    async fn test_pending_future_can_still_be_awaited() {
        let (tx, rx) = oneshot::channel();
        let future = TaskFuture::new(rx);

        let future = future.try_wait().unwrap_err();
        tx.send(Ok(9)).unwrap();

        assert_eq!(future.await.unwrap(), 9);
    }

    #[test]
    fn test_try_wait_on_dropped_task_is_thread_unavailable() {
        let (tx, rx) = oneshot::channel::<Result<u8, DispatchError>>();
        drop(tx);

        let outcome = TaskFuture::new(rx).try_wait().ok().unwrap();
        assert!(outcome.unwrap_err().is_thread_unavailable());
    }

    #[test]
    fn test_dropped_sender_maps_to_thread_unavailable() {
        let (tx, rx) = oneshot::channel::<Result<(), DispatchError>>();
        drop(tx);

        assert!(TaskFuture::new(rx).wait().unwrap_err().is_thread_unavailable());
    }

    #[tokio::test]
    async fn test_await_resolves() {
        let (tx, rx) = oneshot::channel();
        let future = TaskFuture::new(rx);

        tokio::spawn(async move {
            let _ = tx.send(Ok("ready"));
        });

        assert_eq!(future.await.unwrap(), "ready");
    }

    #[test]
    fn test_block_on_with_tokio_test() {
        let (tx, rx) = oneshot::channel();
        tx.send(Ok(1_u64)).unwrap();

        assert_eq!(tokio_test::block_on(TaskFuture::new(rx)).unwrap(), 1);
    }
}
