//! Mounted-view tokens.
//!
//! A view that starts a call (login, register) may be gone by the time the
//! call finishes. The call itself keeps running; only its result is dropped.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

/// Token tracking whether the view that owns it is still mounted.
#[derive(Debug, Clone)]
pub struct ViewScope {
    mounted: Arc<AtomicBool>,
}

impl Default for ViewScope {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewScope {
    /// A freshly mounted scope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mounted: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Mark the view as gone. Idempotent.
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::Release);
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    /// Await `future` to completion and return its output only if the view
    /// is still mounted afterwards.
    pub async fn run<F: Future>(&self, future: F) -> Option<F::Output> {
        let output = future.await;
        if self.is_mounted() {
            Some(output)
        } else {
            debug!("View unmounted, discarding result");
            None
        }
    }
}
