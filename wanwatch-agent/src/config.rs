//! Configuration loading from the process environment
//!
//! Handles:
//! - OPNsense API address and credentials
//! - Loop timings (poll interval, offline time until reboot)
//! - `<KEY>_FILE` indirection for secret-injection environments
//! - Optional `.env` file in the working directory
//!
//! Every setting is required. Loading fails fast with a descriptive
//! [`ConfigError`] before the watchdog loop starts.

use reqwest::Url;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::escalation::{EscalationTimings, SETTLE_DURATION};

pub const API_URL: &str = "OPNSENSE_API_URL";
pub const API_KEY: &str = "OPNSENSE_API_KEY";
pub const API_SECRET: &str = "OPNSENSE_API_SECRET";
pub const ALLOW_INSECURE: &str = "OPNSENSE_ALLOW_INSECURE";
pub const LOOP_INTERVAL: &str = "LOOP_INTERVAL";
pub const OFFLINE_TIME_UNTIL_REBOOT: &str = "OFFLINE_TIME_UNTIL_REBOOT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key}(_FILE) environment variable not set")]
    Missing { key: String },

    #[error("failed to read {key}_FILE at {}: {source}", .path.display())]
    Unreadable {
        key: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{key} is empty")]
    Empty { key: String },

    #[error("failed to parse {key}={value:?} as an integer: {source}")]
    InvalidInteger {
        key: String,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("{key} must be a positive number of seconds, got {value}")]
    NotPositive { key: String, value: u64 },

    #[error("failed to parse {key}={value:?} as a boolean (expected true/false, 1/0, yes/no, on/off)")]
    InvalidBool { key: String, value: String },

    #[error("{key}={value:?} is not a valid http(s) URL: {reason}")]
    InvalidUrl {
        key: String,
        value: String,
        reason: String,
    },
}

/// Where raw setting values come from
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Connection settings for the appliance's management API
#[derive(Debug, Clone)]
pub struct ApplianceConfig {
    pub api_url: Url,
    pub api_key: String,
    pub api_secret: String,
    pub allow_insecure: bool,
}

#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    pub appliance: ApplianceConfig,
    pub poll_interval: Duration,
    pub offline_time_until_reboot: Duration,
}

/// Merge a `.env` file from the working directory into the process
/// environment, if present. Variables already set win.
pub fn merge_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => debug!("Ignoring unreadable .env file: {}", e),
    }
}

impl WatchdogConfig {
    pub fn load(env: &impl EnvSource) -> Result<Self, ConfigError> {
        let appliance = ApplianceConfig {
            api_url: read_url(env, API_URL)?,
            api_key: read_string(env, API_KEY)?,
            api_secret: read_string(env, API_SECRET)?,
            allow_insecure: read_bool(env, ALLOW_INSECURE)?,
        };

        Ok(Self {
            appliance,
            poll_interval: read_seconds(env, LOOP_INTERVAL)?,
            offline_time_until_reboot: read_seconds(env, OFFLINE_TIME_UNTIL_REBOOT)?,
        })
    }

    pub fn timings(&self) -> EscalationTimings {
        EscalationTimings {
            poll_interval: self.poll_interval,
            grace_period: self.offline_time_until_reboot,
            settle_duration: SETTLE_DURATION,
        }
    }
}

/// Raw value for `key`, preferring the file named by `<key>_FILE`
fn read_raw(env: &impl EnvSource, key: &str) -> Result<String, ConfigError> {
    if let Some(path) = env.var(&format!("{}_FILE", key)) {
        let path = PathBuf::from(path);
        return std::fs::read_to_string(&path).map_err(|source| ConfigError::Unreadable {
            key: key.to_string(),
            path,
            source,
        });
    }

    env.var(key).ok_or_else(|| ConfigError::Missing {
        key: key.to_string(),
    })
}

fn read_string(env: &impl EnvSource, key: &str) -> Result<String, ConfigError> {
    let value = read_raw(env, key)?.trim().to_string();
    if value.is_empty() {
        return Err(ConfigError::Empty {
            key: key.to_string(),
        });
    }
    Ok(value)
}

fn read_bool(env: &impl EnvSource, key: &str) -> Result<bool, ConfigError> {
    let value = read_string(env, key)?;
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key: key.to_string(),
            value,
        }),
    }
}

fn read_seconds(env: &impl EnvSource, key: &str) -> Result<Duration, ConfigError> {
    let value = read_string(env, key)?;
    let secs: u64 = value.parse().map_err(|source| ConfigError::InvalidInteger {
        key: key.to_string(),
        value: value.clone(),
        source,
    })?;

    if secs == 0 {
        return Err(ConfigError::NotPositive {
            key: key.to_string(),
            value: secs,
        });
    }
    Ok(Duration::from_secs(secs))
}

fn read_url(env: &impl EnvSource, key: &str) -> Result<Url, ConfigError> {
    let value = read_string(env, key)?;
    let invalid = |reason: String| ConfigError::InvalidUrl {
        key: key.to_string(),
        value: value.clone(),
        reason,
    };

    let url = Url::parse(&value).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    Ok(url)
}
