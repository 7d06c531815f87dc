use std::time::Duration;

use crate::error::{BotError, Result};
use crate::state::correlation_store::{DEFAULT_TTL, MAX_TTL};
use crate::state::pending_uploads::DEFAULT_PENDING_TTL;

pub const DEFAULT_NATS_URL: &str = "nats://127.0.0.1:4222";
pub const DEFAULT_SUPPRESSED_REASONS: &str = "score record not found";

/// Process-wide settings, read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub discord_token: String,
    pub nats_url: String,
    /// Single-tenant default guild. Only used to pick where startup sync runs.
    pub default_guild_id: Option<String>,
    pub pwa_base_url: Option<String>,
    pub correlation_ttl: Duration,
    pub sweep_interval: Duration,
    pub pending_upload_ttl: Duration,
    pub guild_config_ttl: Duration,
    pub guild_config_fetch_timeout: Duration,
    /// Lower-cased substrings of benign backend failure reasons.
    pub suppressed_failure_reasons: Vec<String>,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let discord_token = get("DISCORD_TOKEN").ok_or_else(|| BotError::Config {
            message: "DISCORD_TOKEN is not set".to_string(),
        })?;

        let secs = |key: &str, default: u64| -> Result<Duration> {
            match get(key) {
                None => Ok(Duration::from_secs(default)),
                Some(raw) => raw
                    .parse::<u64>()
                    .ok()
                    .filter(|n| *n > 0)
                    .map(Duration::from_secs)
                    .ok_or_else(|| BotError::Config {
                        message: format!("{} must be a positive number of seconds, got '{}'", key, raw),
                    }),
            }
        };

        let suppressed_failure_reasons =
            parse_reasons(&get("SUPPRESSED_FAILURE_REASONS").unwrap_or_else(|| DEFAULT_SUPPRESSED_REASONS.to_string()));

        Ok(Self {
            discord_token,
            nats_url: get("NATS_URL").unwrap_or_else(|| DEFAULT_NATS_URL.to_string()),
            default_guild_id: get("DISCORD_GUILD_ID"),
            pwa_base_url: get("PWA_BASE_URL").map(|u| u.trim_end_matches('/').to_string()),
            correlation_ttl: secs("CORRELATION_TTL_SECS", DEFAULT_TTL.as_secs())?.min(MAX_TTL),
            sweep_interval: secs("CORRELATION_SWEEP_SECS", 60)?,
            pending_upload_ttl: secs("PENDING_UPLOAD_TTL_SECS", DEFAULT_PENDING_TTL.as_secs())?,
            guild_config_ttl: secs("GUILD_CONFIG_TTL_SECS", 60)?,
            guild_config_fetch_timeout: secs("GUILD_CONFIG_FETCH_TIMEOUT_SECS", 5)?,
            suppressed_failure_reasons,
        })
    }

    /// Config for tests and local runs without an environment.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            discord_token: "test-token".to_string(),
            nats_url: DEFAULT_NATS_URL.to_string(),
            default_guild_id: None,
            pwa_base_url: Some("https://frolf.example".to_string()),
            correlation_ttl: DEFAULT_TTL,
            sweep_interval: Duration::from_secs(60),
            pending_upload_ttl: DEFAULT_PENDING_TTL,
            guild_config_ttl: Duration::from_secs(60),
            guild_config_fetch_timeout: Duration::from_millis(200),
            suppressed_failure_reasons: parse_reasons(DEFAULT_SUPPRESSED_REASONS),
        }
    }
}

fn parse_reasons(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(|r| r.trim().to_lowercase())
        .filter(|r| !r.is_empty())
        .collect()
}
