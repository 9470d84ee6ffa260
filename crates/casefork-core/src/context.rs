//! Cancellation context threaded through forks.

use crate::error::{ForkError, ForkResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Handle passed to every fork and callback.
///
/// Carries an optional stop flag the caller may flip from another thread.
/// The generation engine polls it between replays and aborts enumeration
/// with [`ForkError::Cancelled`]; callbacks receive the same handle and may
/// poll it themselves to return early from long-running work.
#[derive(Clone, Default)]
pub struct ForkContext {
    stop: Option<Arc<AtomicBool>>,
}

impl ForkContext {
    /// A context that can never be cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context cancelled once `stop` becomes true.
    pub fn with_stop_flag(stop: Arc<AtomicBool>) -> Self {
        Self { stop: Some(stop) }
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Fail with [`ForkError::Cancelled`] if cancellation has been requested.
    pub fn ensure_live(&self) -> ForkResult<()> {
        if self.is_cancelled() {
            Err(ForkError::Cancelled)
        } else {
            Ok(())
        }
    }
}
