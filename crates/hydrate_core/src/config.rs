//! Run configuration for the hydration orchestrator.

use std::time::Duration;

use crate::payload::DEFAULT_MAX_PAYLOAD_KB;

/// Default number of queries fetched concurrently.
pub const DEFAULT_CONCURRENCY: usize = 6;

/// Revalidate hint used in periodic-regeneration mode when the caller gives none.
pub const DEFAULT_REVALIDATE_SECONDS: u64 = 60;

/// Tunables for one orchestration run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HydrationConfig {
    /// Maximum fetches in flight. Values below 1 behave as 1.
    pub concurrency: usize,
    /// Snapshots larger than this many KB fall back to client fetching.
    pub max_payload_kb: u64,
    /// Emit the per-run summary and per-query failure logs.
    pub verbose: bool,
    /// Upper bound on a single fetch invocation. `None` waits forever.
    pub fetch_timeout: Option<Duration>,
    /// Revalidate hint for periodic-regeneration mode.
    pub default_revalidate_seconds: u64,
}

impl HydrationConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `HYDRATE_CONCURRENCY` - Maximum fetches in flight (default: 6)
    /// - `HYDRATE_MAX_PAYLOAD_KB` - Payload ceiling in KB (default: 200)
    /// - `HYDRATE_VERBOSE` - `true`/`false`/`1`/`0` (default: on unless production)
    /// - `HYDRATE_ENV` - `production` turns the verbose default off
    /// - `HYDRATE_FETCH_TIMEOUT_MS` - Per-fetch timeout (default: none)
    /// - `HYDRATE_DEFAULT_REVALIDATE` - Revalidate hint in seconds (default: 60)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`HydrationConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let production = lookup("HYDRATE_ENV")
            .map(|v| v.trim().eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        Self {
            concurrency: lookup("HYDRATE_CONCURRENCY")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_CONCURRENCY),
            max_payload_kb: lookup("HYDRATE_MAX_PAYLOAD_KB")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_MAX_PAYLOAD_KB),
            verbose: lookup("HYDRATE_VERBOSE")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(!production),
            fetch_timeout: lookup("HYDRATE_FETCH_TIMEOUT_MS")
                .and_then(|v| v.trim().parse().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
            default_revalidate_seconds: lookup("HYDRATE_DEFAULT_REVALIDATE")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_REVALIDATE_SECONDS),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_max_payload_kb(mut self, max_payload_kb: u64) -> Self {
        self.max_payload_kb = max_payload_kb;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    pub fn with_default_revalidate(mut self, seconds: u64) -> Self {
        self.default_revalidate_seconds = seconds;
        self
    }

    /// Concurrency after clamping to at least one worker.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }
}

impl Default for HydrationConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
