//! Configuration value objects
//!
//! `IMAPConfig` and `PoolConfig` are plain value objects the caller builds
//! and owns; the core never reads the environment on its own behalf. An
//! optional `PoolConfig::from_env()` is provided in the style this crate's
//! ancestor used for its account discovery, for callers who want it.

use std::env;
use std::env::VarError;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;

use crate::auth::ImapAuth;
use crate::errors::ConfigError;

/// Connection parameters for one IMAP account.
///
/// `auth` is `Arc` rather than `Box` because the pool reopens and
/// re-authenticates connections independently of each other and needs to
/// share one auth capability across all of them.
pub struct IMAPConfig {
    pub host: String,
    pub port: u16,
    pub use_ssl: bool,
    pub timeout: Duration,
    pub auth: Arc<dyn ImapAuth>,
    /// Skip TLS certificate validation entirely. Off by default; exists for
    /// connecting to servers with self-signed certificates (a local test
    /// fixture, a bridge process binding `127.0.0.1`) the way this crate's
    /// ancestor did for Proton Bridge. Never enable this against a real
    /// mail provider.
    pub insecure_skip_cert_verify: bool,
}

impl IMAPConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::MissingHost);
        }
        if self.port == 0 {
            return Err(ConfigError::MissingPort);
        }
        Ok(())
    }
}

/// Pool and progressive-search tuning knobs. Defaults match the reference
/// implementation this crate's search algorithm is grounded on.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of connections eagerly opened and authenticated at startup.
    pub pool_size: usize,
    /// Counting-semaphore size gating concurrent `SEARCH` calls.
    pub max_concurrent_searches: usize,
    /// Extra attempts after the first, for replacement-triggering errors.
    pub max_retries: u32,
    /// Sleep between retry attempts.
    pub backoff: Duration,
    /// Accumulator truncation point for the progressive search engine.
    pub max_uids_per_key: usize,
    /// Geometric growth factor applied to the search window each round.
    pub search_window_factor: u32,
    /// Hard cap on progressive-search rounds.
    pub search_max_rounds: u32,
    /// Hard cap on the total UID span scanned across all rounds.
    pub search_max_window_uids: u32,
    /// How long `acquire` blocks waiting for a free connection.
    pub pool_acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: 2,
            max_concurrent_searches: 1,
            max_retries: 1,
            backoff: Duration::from_millis(200),
            max_uids_per_key: 10_000,
            search_window_factor: 4,
            search_max_rounds: 6,
            search_max_window_uids: 200_000,
            pool_acquire_timeout: Duration::from_secs(5),
        }
    }
}

impl PoolConfig {
    /// Load pool knobs from `MAIL_IMAP_POOL_*` environment variables,
    /// falling back to [`PoolConfig::default`] for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            pool_size: parse_usize_env("MAIL_IMAP_POOL_SIZE", defaults.pool_size)?,
            max_concurrent_searches: parse_usize_env(
                "MAIL_IMAP_POOL_MAX_CONCURRENT_SEARCHES",
                defaults.max_concurrent_searches,
            )?,
            max_retries: parse_u32_env("MAIL_IMAP_POOL_MAX_RETRIES", defaults.max_retries)?,
            backoff: Duration::from_millis(parse_u64_env(
                "MAIL_IMAP_POOL_BACKOFF_MS",
                defaults.backoff.as_millis() as u64,
            )?),
            max_uids_per_key: parse_usize_env(
                "MAIL_IMAP_POOL_MAX_UIDS_PER_KEY",
                defaults.max_uids_per_key,
            )?,
            search_window_factor: parse_u32_env(
                "MAIL_IMAP_POOL_SEARCH_WINDOW_FACTOR",
                defaults.search_window_factor,
            )?,
            search_max_rounds: parse_u32_env(
                "MAIL_IMAP_POOL_SEARCH_MAX_ROUNDS",
                defaults.search_max_rounds,
            )?,
            search_max_window_uids: parse_u32_env(
                "MAIL_IMAP_POOL_SEARCH_MAX_WINDOW_UIDS",
                defaults.search_max_window_uids,
            )?,
            pool_acquire_timeout: Duration::from_millis(parse_u64_env(
                "MAIL_IMAP_POOL_ACQUIRE_TIMEOUT_MS",
                defaults.pool_acquire_timeout.as_millis() as u64,
            )?),
        })
    }
}

/// Matches `MAIL_IMAP_<SEGMENT>_HOST`, used only by the doc example below
/// and by callers who want to discover account segments the way the
/// predecessor MCP server did; the core itself never scans the
/// environment for account credentials.
pub fn account_segment_pattern() -> Regex {
    Regex::new(r"^MAIL_IMAP_([A-Z0-9_]+)_HOST$").expect("static regex is valid")
}

fn parse_usize_env(key: &str, default: usize) -> Result<usize, ConfigError> {
    match env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|_| ConfigError::InvalidPoolConfig(format!("{key}: invalid usize '{v}'"))),
        Err(VarError::NotPresent) => Ok(default),
        Err(VarError::NotUnicode(_)) => Err(ConfigError::InvalidPoolConfig(format!(
            "{key} contains non-unicode data"
        ))),
    }
}

fn parse_u32_env(key: &str, default: u32) -> Result<u32, ConfigError> {
    match env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|_| ConfigError::InvalidPoolConfig(format!("{key}: invalid u32 '{v}'"))),
        Err(VarError::NotPresent) => Ok(default),
        Err(VarError::NotUnicode(_)) => Err(ConfigError::InvalidPoolConfig(format!(
            "{key} contains non-unicode data"
        ))),
    }
}

fn parse_u64_env(key: &str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|_| ConfigError::InvalidPoolConfig(format!("{key}: invalid u64 '{v}'"))),
        Err(VarError::NotPresent) => Ok(default),
        Err(VarError::NotUnicode(_)) => Err(ConfigError::InvalidPoolConfig(format!(
            "{key} contains non-unicode data"
        ))),
    }
}
