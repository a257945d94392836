//! Binds a `(workspace, event_sink, options)` tuple to a provider.

use std::sync::Arc;

use crate::error::ProviderError;
use crate::event::ExpireOptions;
use crate::provider::LeaseProvider;
use crate::timestamp::Timestamp;

/// An immutable expiry binding, built from a [`crate::contract::LeaseExpiryContract`].
pub struct ExpireExecutor {
    workspace: String,
    event_sink: String,
    options: ExpireOptions,
    provider: Arc<LeaseProvider>,
}

impl ExpireExecutor {
    #[must_use]
    pub(crate) fn new(
        workspace: String,
        event_sink: String,
        options: ExpireOptions,
        provider: Arc<LeaseProvider>,
    ) -> Self {
        Self {
            workspace,
            event_sink,
            options,
            provider,
        }
    }

    /// The workspace this executor retires leases for.
    #[must_use]
    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    /// The event sink this executor publishes `EXPIRED` events on.
    #[must_use]
    pub fn event_sink(&self) -> &str {
        &self.event_sink
    }

    /// Retire every due lease as of `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on a backend failure.
    pub async fn execute(&self, timestamp: Timestamp) -> Result<u64, ProviderError> {
        self.provider
            .expire(&self.workspace, &self.event_sink, timestamp, &self.options)
            .await
    }
}
