//! Cooperative cancellation for long generation calls

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag checked between cells
///
/// Clones share the same flag, so a host can keep one clone and hand the
/// other to [`VoronoiGenerator::with_cancel_token`](crate::VoronoiGenerator::with_cancel_token).
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Clear a previous cancellation so the token can be reused
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }

    /// Check whether cancellation was requested
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
