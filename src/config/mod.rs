//! Configuration module for guildline.
//!
//! Loads configuration from environment variables.

use std::env;
use std::time::Duration;

use thiserror::Error;

/// Default API root of the remote platform.
pub const DEFAULT_BASE_URL: &str = "https://www.kookapp.cn/api";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value `{value}`")]
    Invalid { name: &'static str, value: String },
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // Remote API
    pub bot_token: String,
    pub base_url: String,

    /// Disable all local throttling.
    /// The server may then throttle us instead.
    pub disable_rate_limit: bool,

    /// Remaining-count at or below which a bucket waits.
    pub rate_limit_low_water: i64,

    /// Seconds added on top of the server's reset window before retrying.
    pub rate_limit_margin: Duration,

    /// Idle time after which a retained entity is released.
    /// `None` keeps the cache purely weak.
    pub entity_retain: Option<Duration>,
    pub entity_retain_capacity: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            disable_rate_limit: false,
            rate_limit_low_water: 0,
            rate_limit_margin: Duration::from_secs(3),
            entity_retain: None,
            entity_retain_capacity: 10_000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Reads a `.env` file first if one is present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bot_token = lookup("BOT_TOKEN")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("BOT_TOKEN"))?;

        let base_url = lookup("API_BASE_URL")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.base_url);

        let disable_rate_limit = match lookup("DISABLE_RATE_LIMIT") {
            Some(raw) => parse_flag("DISABLE_RATE_LIMIT", &raw)?,
            None => false,
        };

        let rate_limit_low_water = match lookup("RATE_LIMIT_LOW_WATER") {
            Some(raw) => parse_number::<i64>("RATE_LIMIT_LOW_WATER", &raw)?,
            None => defaults.rate_limit_low_water,
        };

        let rate_limit_margin = match lookup("RATE_LIMIT_MARGIN_SECS") {
            Some(raw) => Duration::from_secs(parse_number("RATE_LIMIT_MARGIN_SECS", &raw)?),
            None => defaults.rate_limit_margin,
        };

        let entity_retain = lookup("ENTITY_RETAIN_SECS")
            .map(|raw| parse_number::<u64>("ENTITY_RETAIN_SECS", &raw))
            .transpose()?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let entity_retain_capacity = match lookup("ENTITY_RETAIN_CAPACITY") {
            Some(raw) => parse_number("ENTITY_RETAIN_CAPACITY", &raw)?,
            None => defaults.entity_retain_capacity,
        };

        Ok(Self {
            bot_token,
            base_url,
            disable_rate_limit,
            rate_limit_low_water,
            rate_limit_margin,
            entity_retain,
            entity_retain_capacity,
        })
    }
}

fn parse_flag(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: raw.to_string(),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
        name,
        value: raw.to_string(),
    })
}
