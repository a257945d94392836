//! Declarative per-workspace reaper configuration.

use std::sync::Arc;

use crate::event::ExpireOptions;
use crate::executor::ExpireExecutor;
use crate::provider::LeaseProvider;

/// Binds a workspace to the event sink its expiries should be published on,
/// plus an optional per-call retirement cap.
#[derive(Debug, Clone)]
pub struct LeaseExpiryContract {
    pub workspace: String,
    pub event_sink: String,
    pub max_in_flight: u64,
}

impl LeaseExpiryContract {
    /// Build a contract. Both `workspace` and `event_sink` must be
    /// non-empty; `max_in_flight` of `0` means unlimited.
    #[must_use]
    pub fn new(workspace: impl Into<String>, event_sink: impl Into<String>, max_in_flight: u64) -> Self {
        Self {
            workspace: workspace.into(),
            event_sink: event_sink.into(),
            max_in_flight,
        }
    }

    /// Bind this contract to a provider, producing an executor the reaper
    /// can drive.
    ///
    /// # Panics
    ///
    /// Panics if `workspace` or `event_sink` is empty — these are
    /// programming errors, caught at registration time rather than surfaced
    /// as a runtime `Result`.
    #[must_use]
    pub fn create_expire_executor(&self, provider: Arc<LeaseProvider>) -> ExpireExecutor {
        assert!(!self.workspace.is_empty(), "'workspace' cannot be an empty string");
        assert!(!self.event_sink.is_empty(), "'event_sink' cannot be an empty string");

        let options = if self.max_in_flight > 0 {
            ExpireOptions::with_limit(self.max_in_flight)
        } else {
            ExpireOptions::unlimited()
        };

        ExpireExecutor::new(self.workspace.clone(), self.event_sink.clone(), options, provider)
    }
}
