//! Configuration module for environment variable parsing.
//!
//! Reads all configuration from environment variables. Invalid values fall
//! back to their defaults with a warning; missing credentials are reported
//! by [`crate::credentials::Credentials::from_config`].

use std::env;
use std::time::Duration;

use tracing::warn;

/// Default base URL for follow-up delivery.
pub const DEFAULT_API_BASE_URL: &str = "https://discord.com/api/v10";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Hex-encoded Ed25519 public key used for every request
    pub public_key: Option<String>,

    /// Per-host public keys for multi-tenant deployments, `(host, key)`
    pub tenant_public_keys: Option<Vec<(String, String)>>,

    /// Application id used for follow-ups when the payload lacks one
    pub application_id: Option<String>,

    /// Base URL of the platform API that receives follow-up edits
    pub api_base_url: String,

    /// Wall-clock budget for a handler to call `reply`
    pub reply_deadline_ms: u64,

    /// HTTP timeout for a single follow-up delivery
    pub follow_up_timeout_ms: u64,

    /// Maximum number of follow-ups in flight at once
    pub max_pending_follow_ups: usize,

    /// Maximum accepted age of `X-Signature-Timestamp`, disabled when unset
    pub signature_max_age_secs: Option<u64>,

    /// How long shutdown waits for background work before cancelling it
    pub shutdown_drain_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            public_key: None,
            tenant_public_keys: None,
            application_id: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            reply_deadline_ms: 2500,
            follow_up_timeout_ms: 8000,
            max_pending_follow_ups: 256,
            signature_max_age_secs: None,
            shutdown_drain_ms: 5000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            port: parse_or("PORT", defaults.port),

            public_key: non_empty("DISCORD_PUBLIC_KEY"),

            tenant_public_keys: parse_pairs("DISCORD_PUBLIC_KEYS"),

            application_id: non_empty("DISCORD_APPLICATION_ID"),

            api_base_url: non_empty("API_BASE_URL").unwrap_or(defaults.api_base_url),

            reply_deadline_ms: parse_or("REPLY_DEADLINE_MS", defaults.reply_deadline_ms),

            follow_up_timeout_ms: parse_or("FOLLOW_UP_TIMEOUT_MS", defaults.follow_up_timeout_ms),

            max_pending_follow_ups: parse_or(
                "MAX_PENDING_FOLLOW_UPS",
                defaults.max_pending_follow_ups,
            ),

            signature_max_age_secs: parse_optional("SIGNATURE_MAX_AGE_SECS"),

            shutdown_drain_ms: parse_or("SHUTDOWN_DRAIN_MS", defaults.shutdown_drain_ms),
        }
    }

    pub fn reply_deadline(&self) -> Duration {
        Duration::from_millis(self.reply_deadline_ms)
    }

    pub fn follow_up_timeout(&self) -> Duration {
        Duration::from_millis(self.follow_up_timeout_ms)
    }

    pub fn shutdown_drain(&self) -> Duration {
        Duration::from_millis(self.shutdown_drain_ms)
    }
}

/// Parse a variable, warning and using the default when it does not parse.
fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(env_var = name, value = %raw, "Invalid value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Parse an optional variable, warning and leaving it unset when it does not parse.
fn parse_optional<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = non_empty(name)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, leaving unset");
            None
        }
    }
}

/// Read a variable, treating blank values as unset.
fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a comma-separated list of `key=value` pairs like "a.example=ab12,b.example=cd34".
fn parse_pairs(name: &str) -> Option<Vec<(String, String)>> {
    let raw = non_empty(name)?;

    let mut pairs = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match entry.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() && !value.trim().is_empty() => {
                pairs.push((key.trim().to_ascii_lowercase(), value.trim().to_string()));
            }
            _ => {
                warn!(env_var = name, entry = %entry, "Invalid pair format, skipping");
            }
        }
    }

    if pairs.is_empty() {
        None
    } else {
        Some(pairs)
    }
}
