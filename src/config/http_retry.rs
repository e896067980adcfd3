use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{deserialize_duration_from_ms, deserialize_duration_from_seconds};

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> Duration {
    Duration::from_millis(250)
}

fn default_max_backoff_secs() -> Duration {
    Duration::from_secs(10)
}

fn default_base_for_backoff() -> u32 {
    2
}

/// Jitter applied to retry backoff durations.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JitterSetting {
    /// No jitter.
    None,
    /// Full jitter, randomizing each backoff.
    #[default]
    Full,
}

/// Retry policy for notification HTTP requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct HttpRetryConfig {
    /// Maximum number of retries for transient errors.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base for exponential backoff calculations.
    #[serde(default = "default_base_for_backoff")]
    pub base_for_backoff: u32,
    /// Backoff before the first retry.
    #[serde(
        default = "default_initial_backoff_ms",
        deserialize_with = "deserialize_duration_from_ms"
    )]
    pub initial_backoff_ms: Duration,
    /// Upper bound on any single backoff.
    #[serde(
        default = "default_max_backoff_secs",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub max_backoff_secs: Duration,
    /// Jitter setting.
    #[serde(default)]
    pub jitter: JitterSetting,
}

impl Default for HttpRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_for_backoff: default_base_for_backoff(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_secs: default_max_backoff_secs(),
            jitter: JitterSetting::default(),
        }
    }
}
