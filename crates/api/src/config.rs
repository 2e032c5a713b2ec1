//! Application configuration loaded from environment variables.

use std::time::Duration;

use saga::JoinSettings;

const DEFAULT_PORT: u16 = 6104;
const DEFAULT_GROUPING_URL: &str = "http://grouping:6103/grouping";
const DEFAULT_BROADCAST_URL: &str = "http://broadcast:6102/broadcast";
const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 5000;
const DEFAULT_UPDATE_ATTEMPTS: u32 = 3;
const DEFAULT_READ_RETRIES: u32 = 1;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `6104`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `GROUPING_URL`: base URL of the Grouping collaborator
/// - `BROADCAST_URL`: base URL of the Broadcast collaborator
/// - `UPSTREAM_TIMEOUT_MS`: bound on each upstream call (default: `5000`)
/// - `UPDATE_ATTEMPTS`: attempts per partial-fill update (default: `3`)
/// - `READ_RETRIES`: extra attempts per read (default: `1`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub grouping_url: String,
    pub broadcast_url: String,
    pub upstream_timeout: Duration,
    pub update_attempts: u32,
    pub read_retries: u32,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// Unparseable numeric values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse().ok());

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parsed("PORT")
                .and_then(|p: u64| u16::try_from(p).ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            grouping_url: lookup("GROUPING_URL").unwrap_or(defaults.grouping_url),
            broadcast_url: lookup("BROADCAST_URL").unwrap_or(defaults.broadcast_url),
            upstream_timeout: parsed("UPSTREAM_TIMEOUT_MS")
                .filter(|ms: &u64| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.upstream_timeout),
            update_attempts: parsed("UPDATE_ATTEMPTS")
                .map(|n: u64| u32::try_from(n).unwrap_or(u32::MAX))
                .filter(|n| *n > 0)
                .unwrap_or(defaults.update_attempts),
            read_retries: parsed("READ_RETRIES")
                .map(|n: u64| u32::try_from(n).unwrap_or(u32::MAX))
                .unwrap_or(defaults.read_retries),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Coordinator tuning derived from this configuration.
    pub fn join_settings(&self) -> JoinSettings {
        JoinSettings {
            call_timeout: self.upstream_timeout,
            read_retries: self.read_retries,
            update_attempts: self.update_attempts,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            log_level: "info".to_string(),
            grouping_url: DEFAULT_GROUPING_URL.to_string(),
            broadcast_url: DEFAULT_BROADCAST_URL.to_string(),
            upstream_timeout: Duration::from_millis(DEFAULT_UPSTREAM_TIMEOUT_MS),
            update_attempts: DEFAULT_UPDATE_ATTEMPTS,
            read_retries: DEFAULT_READ_RETRIES,
        }
    }
}
