//! Exponential-jitter retry backoff, mirroring the reaper's per-executor
//! retry loop.

use std::time::Duration;

use rand::Rng;

/// Retry policy: bounds on attempt count and backoff range.
///
/// `-1` disables the corresponding behaviour (`max_retries: -1` means no
/// retries at all; `min_backoff`/`max_backoff` of `-1` means no sleep).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: i32,
    pub min_backoff_ms: i64,
    pub max_backoff_ms: i64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            min_backoff_ms: DEFAULT_MIN_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
        }
    }
}

/// Default minimum backoff, used when a caller supplies `0`.
pub const DEFAULT_MIN_BACKOFF_MS: i64 = 8;
/// Default maximum backoff, used when a caller supplies `0`.
pub const DEFAULT_MAX_BACKOFF_MS: i64 = 512;

impl RetryPolicy {
    /// Build a policy from raw configuration values, applying the same
    /// `-1`/`0` sentinel semantics as the client's shared option struct.
    #[must_use]
    pub fn from_config(max_retries: i32, min_backoff_ms: i64, max_backoff_ms: i64) -> Self {
        let max_retries = if max_retries < 0 { 0 } else { max_retries };
        let min_backoff_ms = match min_backoff_ms {
            -1 => -1,
            0 => DEFAULT_MIN_BACKOFF_MS,
            v => v,
        };
        let max_backoff_ms = match max_backoff_ms {
            -1 => -1,
            0 => DEFAULT_MAX_BACKOFF_MS,
            v => v,
        };
        Self {
            max_retries,
            min_backoff_ms,
            max_backoff_ms,
        }
    }

    /// Whether backoff sleeping is disabled entirely.
    #[must_use]
    pub fn backoff_disabled(&self) -> bool {
        self.min_backoff_ms < 0 || self.max_backoff_ms < 0
    }
}

/// Compute a capped exponential-jitter backoff for the given retry attempt
/// (0-indexed). Returns `Duration::ZERO` if backoff is disabled or the
/// computed bound collapses to zero.
#[must_use]
pub fn retry_backoff(policy: &RetryPolicy, retry: u32) -> Duration {
    if policy.backoff_disabled() {
        return Duration::ZERO;
    }

    let min = policy.min_backoff_ms.max(0) as u64;
    let max = policy.max_backoff_ms.max(0) as u64;

    let backoff = min.checked_shl(retry).unwrap_or(u64::MAX);
    let backoff = if backoff > max || backoff < min { max } else { backoff };

    if backoff == 0 {
        return Duration::ZERO;
    }

    let jittered = rand::thread_rng().gen_range(0..backoff);
    Duration::from_millis(jittered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_applies_sentinels() {
        let policy = RetryPolicy::from_config(-1, 0, 0);
        assert_eq!(policy.max_retries, 0);
        assert_eq!(policy.min_backoff_ms, DEFAULT_MIN_BACKOFF_MS);
        assert_eq!(policy.max_backoff_ms, DEFAULT_MAX_BACKOFF_MS);
    }

    #[test]
    fn disabled_backoff_is_zero() {
        let policy = RetryPolicy::from_config(3, -1, -1);
        assert_eq!(retry_backoff(&policy, 0), Duration::ZERO);
        assert_eq!(retry_backoff(&policy, 5), Duration::ZERO);
    }

    #[test]
    fn backoff_is_bounded_by_max() {
        let policy = RetryPolicy::from_config(10, 8, 512);
        for retry in 0..20 {
            let backoff = retry_backoff(&policy, retry);
            assert!(backoff <= Duration::from_millis(512));
        }
    }
}
