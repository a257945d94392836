//! The expiry event payload and the `Expire` named-option builder.

use crate::timestamp::Timestamp;

/// An `EXPIRED` event read back off a workspace's event sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub action: String,
    pub sink: String,
    pub workspace: String,
    pub lease_id: String,
    pub expire_at: Timestamp,
    pub timestamp: Timestamp,
}

/// Named options accepted by [`crate::provider::LeaseProvider::expire`].
///
/// A typed replacement for the original's reflection-based `LeaseArg`
/// unpacking — Rust has no equivalent need for it, since the option set is
/// small and fixed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpireOptions {
    limit: Option<u64>,
}

impl ExpireOptions {
    /// No limit: retire every due lease in one call.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Cap the number of leases retired per call. `0` is treated the same
    /// as unlimited.
    #[must_use]
    pub fn with_limit(limit: u64) -> Self {
        Self { limit: Some(limit) }
    }

    #[must_use]
    pub(crate) fn limit(&self) -> Option<u64> {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_has_no_limit() {
        assert_eq!(ExpireOptions::unlimited().limit(), None);
    }

    #[test]
    fn with_limit_carries_the_value() {
        assert_eq!(ExpireOptions::with_limit(10).limit(), Some(10));
    }
}
