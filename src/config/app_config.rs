use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use super::{deserialize_duration_from_ms, deserialize_duration_from_seconds, HttpRetryConfig};

fn default_notification_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_telegram_send_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_scan_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_scan_max_connections() -> u32 {
    2
}

fn default_smtp_port() -> u16 {
    587
}

/// SMTP transport settings for the email channel.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SmtpConfig {
    /// SMTP relay hostname.
    pub host: String,
    /// SMTP port.
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// SMTP username.
    #[serde(default)]
    pub username: String,
    /// SMTP password.
    #[serde(default)]
    pub password: String,
    /// Sender address for all outgoing mail.
    pub from_address: String,
}

/// Application configuration for tablewatch.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Database URL for the app's own SQLite store.
    pub database_url: String,

    /// Secret used to encrypt connection passwords at rest.
    pub encryption_key: String,

    /// SMTP settings for the email notification channel. Optional; observers
    /// with email recipients fail their email channel when absent.
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,

    /// Retry policy for notification HTTP requests.
    #[serde(default)]
    pub http_retry_config: HttpRetryConfig,

    /// Hard cap on any single notification HTTP request.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        default = "default_notification_timeout"
    )]
    pub notification_timeout_secs: Duration,

    /// Pause between consecutive Telegram sends (provider rate limit).
    #[serde(
        deserialize_with = "deserialize_duration_from_ms",
        default = "default_telegram_send_delay"
    )]
    pub telegram_send_delay_ms: Duration,

    /// Connect timeout for external datastore handles.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        default = "default_scan_connect_timeout"
    )]
    pub scan_connect_timeout_secs: Duration,

    /// Per-credential pool size for external datastore handles. The sweep is
    /// sequential, so this stays small.
    #[serde(default = "default_scan_max_connections")]
    pub scan_max_connections: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            encryption_key: String::new(),
            smtp: None,
            http_retry_config: HttpRetryConfig::default(),
            notification_timeout_secs: default_notification_timeout(),
            telegram_send_delay_ms: default_telegram_send_delay(),
            scan_connect_timeout_secs: default_scan_connect_timeout(),
            scan_max_connections: default_scan_max_connections(),
        }
    }
}

impl AppConfig {
    /// Creates a new `AppConfig` from `<config_dir>/app.yaml` with an
    /// environment overlay (`TABLEWATCH__` prefix).
    pub fn new(config_dir: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir = config_dir.unwrap_or("configs");
        let s = Config::builder()
            .add_source(File::with_name(&format!("{config_dir}/app.yaml")))
            .add_source(Environment::with_prefix("TABLEWATCH").separator("__"))
            .build()?;
        s.try_deserialize()
    }
}
