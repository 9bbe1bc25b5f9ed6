// Error types for the dispatch and progress layers
//
// Library errors use thiserror; application code wraps them with anyhow.

use std::any::Any;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Failure delivered through a [`TaskFuture`](crate::dispatch::TaskFuture)
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The target run loop stopped before the task could run.
    #[error("target run loop is no longer processing work")]
    ThreadUnavailable,

    /// The dispatched closure panicked on the target thread.
    #[error("dispatched task panicked: {0}")]
    Panicked(PanicPayload),
}

impl DispatchError {
    /// True for [`DispatchError::ThreadUnavailable`]
    pub fn is_thread_unavailable(&self) -> bool {
        matches!(self, Self::ThreadUnavailable)
    }

    /// Re-raise a captured panic on the calling thread, or return the error unchanged.
    pub fn resume_panic(self) -> Self {
        match self {
            Self::Panicked(payload) => payload.resume(),
            other => other,
        }
    }
}

/// The value a dispatched closure panicked with.
///
/// The original payload is kept so the panic can be resumed on the thread
/// that observes the result.
pub struct PanicPayload {
    message: String,
    payload: Mutex<Box<dyn Any + Send>>,
}

impl PanicPayload {
    pub(crate) fn new(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_string()
        };

        Self {
            message,
            payload: Mutex::new(payload),
        }
    }

    /// The panic message, when the payload was a string
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The original panic payload
    pub fn into_inner(self) -> Box<dyn Any + Send> {
        self.payload
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Continue unwinding with the original payload on the current thread.
    pub fn resume(self) -> ! {
        std::panic::resume_unwind(self.into_inner())
    }
}

impl fmt::Debug for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanicPayload")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Returned by workers that stopped because [`Progress::shall_abort`](crate::Progress::shall_abort)
/// reported true.
///
/// Failure reporting recognizes this error anywhere in a cause chain and stays
/// silent, since the user asked for it.
#[derive(Error, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[error("operation cancelled by user")]
pub struct Cancelled;
