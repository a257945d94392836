//! The domain [`Lease`] value object.

use std::time::Duration;

use crate::timestamp::Timestamp;

/// A lease as handed to callers: identity plus its TTL and (if still
/// indexed) its current absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub id: String,
    pub ttl: Duration,
    pub expire_at: Option<Timestamp>,
}

impl Lease {
    /// Construct a lease a caller intends to `Grant`. `expire_at` is left
    /// unset — the backend computes it from the supplied timestamp.
    #[must_use]
    pub fn new(id: impl Into<String>, ttl: Duration) -> Self {
        Self {
            id: id.into(),
            ttl,
            expire_at: None,
        }
    }

    /// Time since expiry, relative to now: `now - expire_at`. Negative while
    /// the lease is still alive, positive once it has expired. `None` if the
    /// lease carries no recorded expiry.
    #[must_use]
    pub fn time_to_live(&self) -> Option<chrono::Duration> {
        self.expire_at.map(|expire_at| Timestamp::now().signed_duration_since(expire_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_to_live_is_none_without_expiry() {
        let lease = Lease::new("a", Duration::from_secs(30));
        assert!(lease.time_to_live().is_none());
    }

    #[test]
    fn time_to_live_is_positive_after_expiry() {
        let mut lease = Lease::new("a", Duration::from_secs(30));
        lease.expire_at = Some(Timestamp::from_millis(Timestamp::now().as_millis() - 60_000));
        assert!(lease.time_to_live().unwrap() > chrono::Duration::zero());
    }

    #[test]
    fn time_to_live_is_negative_while_alive() {
        let mut lease = Lease::new("a", Duration::from_secs(30));
        lease.expire_at = Some(Timestamp::from_millis(Timestamp::now().as_millis() + 60_000));
        assert!(lease.time_to_live().unwrap() < chrono::Duration::zero());
    }
}
