// Monitor - a value bundled with its mutex and condition variable
//
// Every piece of state shared between worker and controller threads lives in a
// Monitor. The value is only reachable from inside the closures passed to
// `with_lock`, `update` and `wait_while`, so it can never be read or written
// without holding the lock.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// A value guarded by one mutex and one condition variable.
///
/// # Example
/// ```
/// use crossloop::Monitor;
///
/// let counter = Monitor::new(0u32);
/// counter.update(|value| *value += 1);
/// assert_eq!(counter.with_lock(|value| *value), 1);
/// ```
#[derive(Debug, Default)]
pub struct Monitor<T> {
    value: Mutex<T>,
    condvar: Condvar,
}

impl<T> Monitor<T> {
    /// Wrap a value in a new monitor
    pub const fn new(value: T) -> Self {
        Self {
            value: Mutex::new(value),
            condvar: Condvar::new(),
        }
    }

    /// Run `f` with exclusive access to the value.
    ///
    /// Waiters are not woken; use [`update`](Self::update) for changes that
    /// a `wait_while` condition depends on.
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    /// Run `f` with exclusive access to the value, then wake every waiter.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let result = {
            let mut guard = self.lock();
            f(&mut guard)
        };
        self.condvar.notify_all();
        result
    }

    /// Block until `condition` returns false, then run `f` under the same lock.
    ///
    /// The condition is re-evaluated after every wake-up, so spurious wake-ups
    /// are harmless.
    pub fn wait_while<R>(
        &self,
        mut condition: impl FnMut(&T) -> bool,
        f: impl FnOnce(&mut T) -> R,
    ) -> R {
        let guard = self.lock();
        let mut guard = self
            .condvar
            .wait_while(guard, |value| condition(value))
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Wake every thread blocked in [`wait_while`](Self::wait_while).
    pub fn notify_all(&self) {
        self.condvar.notify_all();
    }

    /// Consume the monitor and return the value
    pub fn into_inner(self) -> T {
        self.value.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    // A panic while the lock was held cannot leave the guarded values in a
    // torn state (they are plain flags and pointers), so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, T> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
