//! Daemon configuration for `lease-server`.
//!
//! Loads configuration from environment variables with sensible defaults.
//! All settings can be overridden via `LEASE_*` environment variables.

use std::net::SocketAddr;
use std::time::Duration;

/// One `workspace:event_sink[:max_in_flight]` entry from `LEASE_WORKSPACES`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceEntry {
    pub workspace: String,
    pub event_sink: String,
    pub max_in_flight: u64,
}

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis connection string.
    pub redis_url: String,
    /// Address to bind the operational HTTP listener to.
    pub bind_addr: SocketAddr,
    /// Log level filter (e.g., `info`, `debug`, `warn`).
    pub log_level: String,
    /// Delay after a tick that retired at least one lease.
    pub polling_timeout: Duration,
    /// Delay after a tick that retired nothing.
    pub idling_timeout: Duration,
    /// Maximum retry attempts per executor per tick.
    pub max_retries: i32,
    /// Minimum retry backoff in milliseconds.
    pub min_retry_backoff_ms: i64,
    /// Maximum retry backoff in milliseconds.
    pub max_retry_backoff_ms: i64,
    /// Workspaces the reaper should register expiry contracts for.
    pub workspaces: Vec<WorkspaceEntry>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `LEASE_REDIS_URL` (default `redis://127.0.0.1:6379`)
    /// - `LEASE_BIND_ADDR` (default `127.0.0.1:8600`)
    /// - `LEASE_LOG_LEVEL` (default `info`)
    /// - `LEASE_POLLING_TIMEOUT_MS` / `LEASE_IDLING_TIMEOUT_MS` (defaults 500 / 5000)
    /// - `LEASE_MAX_RETRIES` / `LEASE_MIN_RETRY_BACKOFF_MS` / `LEASE_MAX_RETRY_BACKOFF_MS` (defaults 8 / 8 / 512)
    /// - `LEASE_WORKSPACES` — comma-separated `workspace:event_sink[:max_in_flight]` triples
    #[must_use]
    pub fn from_env() -> Self {
        let redis_url =
            std::env::var("LEASE_REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_owned());

        let bind_addr = std::env::var("LEASE_BIND_ADDR")
            .ok()
            .and_then(|a| a.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8600)));

        let log_level = std::env::var("LEASE_LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());

        let polling_timeout = Duration::from_millis(env_u64("LEASE_POLLING_TIMEOUT_MS", 500));
        let idling_timeout = Duration::from_millis(env_u64("LEASE_IDLING_TIMEOUT_MS", 5000));

        let max_retries = env_i32("LEASE_MAX_RETRIES", 8);
        let min_retry_backoff_ms = env_i64("LEASE_MIN_RETRY_BACKOFF_MS", 8);
        let max_retry_backoff_ms = env_i64("LEASE_MAX_RETRY_BACKOFF_MS", 512);

        let workspaces = std::env::var("LEASE_WORKSPACES")
            .ok()
            .map(|raw| parse_workspaces(&raw))
            .unwrap_or_default();

        Self {
            redis_url,
            bind_addr,
            log_level,
            polling_timeout,
            idling_timeout,
            max_retries,
            min_retry_backoff_ms,
            max_retry_backoff_ms,
            workspaces,
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_i32(name: &str, default: i32) -> i32 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_i64(name: &str, default: i64) -> i64 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parse_workspaces(raw: &str) -> Vec<WorkspaceEntry> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|entry| {
            let mut parts = entry.splitn(3, ':');
            let workspace = parts.next()?.to_owned();
            let event_sink = parts.next()?.to_owned();
            let max_in_flight = parts.next().and_then(|v| v.parse().ok()).unwrap_or(0);
            Some(WorkspaceEntry {
                workspace,
                event_sink,
                max_in_flight,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_workspace_entries_with_and_without_limit() {
        let entries = parse_workspaces("ws1:sink1:10, ws2:sink2");
        assert_eq!(
            entries,
            vec![
                WorkspaceEntry {
                    workspace: "ws1".to_owned(),
                    event_sink: "sink1".to_owned(),
                    max_in_flight: 10,
                },
                WorkspaceEntry {
                    workspace: "ws2".to_owned(),
                    event_sink: "sink2".to_owned(),
                    max_in_flight: 0,
                },
            ]
        );
    }

    #[test]
    fn empty_workspaces_env_yields_empty_list() {
        assert!(parse_workspaces("").is_empty());
    }
}
