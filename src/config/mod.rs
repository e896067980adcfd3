//! Application configuration.

mod app_config;
mod http_retry;

pub use app_config::{AppConfig, SmtpConfig};
pub use http_retry::{HttpRetryConfig, JitterSetting};

use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Deserializes a `Duration` from an integer number of milliseconds.
pub fn deserialize_duration_from_ms<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let ms = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(ms))
}

/// Deserializes a `Duration` from an integer number of seconds.
pub fn deserialize_duration_from_seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}
