//! Shared application state for the operational HTTP surface.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lease_core::LeaseReaper;

/// State shared across the `/healthz`/`/readyz` handlers.
pub struct AppState {
    pub reaper: Arc<LeaseReaper>,
    ready: AtomicBool,
}

impl AppState {
    #[must_use]
    pub fn new(reaper: Arc<LeaseReaper>) -> Self {
        Self {
            reaper,
            ready: AtomicBool::new(false),
        }
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}
