//! Cross-thread dispatch.
//!
//! A [`RunLoop`] is a FIFO work queue owned by one thread. Other threads post
//! closures to it through a [`RunLoopHandle`] and observe the outcome through
//! a [`TaskFuture`]:
//!
//! - [`RunLoopHandle::post`] with [`InvokeMode::Auto`] runs the closure inline
//!   when the caller already is the loop's thread, and queues it otherwise;
//! - [`InvokeMode::Queued`] always appends to the queue, preserving FIFO order
//!   with other queued work;
//! - [`RunLoopHandle::post_sync`] posts with `Auto` and blocks for the result.
//!
//! Panics inside a dispatched closure are captured and delivered as
//! [`DispatchError::Panicked`](crate::DispatchError::Panicked). Work that can
//! no longer run because its loop stopped resolves with
//! [`DispatchError::ThreadUnavailable`](crate::DispatchError::ThreadUnavailable);
//! a task is never dropped silently.
//!
//! [`LoopThread`] owns a dedicated OS thread running a loop.

pub mod future;
pub mod loop_thread;
pub mod run_loop;
mod task;

pub use future::TaskFuture;
pub use loop_thread::LoopThread;
pub use run_loop::{InvokeMode, RunLoop, RunLoopHandle};
