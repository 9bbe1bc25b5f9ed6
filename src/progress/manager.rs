// Progress managers and the no-op fallback
//
// Code that spawns workers normally receives its manager through a
// ProgressContext. The process-wide slot below exists for start-up wiring:
// whoever builds the application registers a manager once, and
// ProgressContext::from_global snapshots it.

use crate::progress::Progress;
use std::sync::{Arc, PoisonError, RwLock};

/// Factory for progress handles, keyed by a human-readable operation name.
///
/// Must be callable from any thread.
pub trait ProgressManager: Send + Sync {
    fn create_progress(&self, operation_name: &str) -> Box<dyn Progress>;
}

/// Progress sink used when no manager is available: discards updates and
/// never asks the worker to abort.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl Progress for NullProgress {
    fn set_progress(&self, _fraction: f64) {}

    fn shall_abort(&self) -> bool {
        false
    }
}

static GLOBAL_MANAGER: RwLock<Option<Arc<dyn ProgressManager>>> = RwLock::new(None);

/// Register (or with `None`, clear) the process-wide manager.
///
/// Last writer wins. Returns the previously registered manager.
pub fn set_global_manager(
    manager: Option<Arc<dyn ProgressManager>>,
) -> Option<Arc<dyn ProgressManager>> {
    let mut slot = GLOBAL_MANAGER.write().unwrap_or_else(PoisonError::into_inner);
    tracing::debug!(
        "Global progress manager {}",
        if manager.is_some() { "registered" } else { "cleared" }
    );
    std::mem::replace(&mut *slot, manager)
}

/// The process-wide manager, if one is registered
pub fn global_manager() -> Option<Arc<dyn ProgressManager>> {
    GLOBAL_MANAGER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Create a progress handle through the process-wide manager, falling back to
/// [`NullProgress`] when none is registered.
pub fn create_progress(operation_name: &str) -> Box<dyn Progress> {
    match global_manager() {
        Some(manager) => manager.create_progress(operation_name),
        None => Box::new(NullProgress),
    }
}
