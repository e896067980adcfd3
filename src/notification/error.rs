//! Error types for the notification service.

use thiserror::Error;

use crate::http_client::HttpClientPoolError;

/// Defines the possible errors that can occur while delivering notifications.
///
/// These never escape a dispatch: per-destination failures are folded into
/// the [`crate::models::DispatchReport`] instead.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// An error related to invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A recipient address could not be parsed.
    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(#[from] lettre::address::AddressError),

    /// Building the email message failed.
    #[error("Failed to build email: {0}")]
    EmailBuild(#[from] lettre::error::Error),

    /// The SMTP transport rejected the message.
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// An error originating from the HTTP client pool.
    #[error("HTTP client error")]
    HttpClientError(#[from] HttpClientPoolError),

    /// An error from the underlying `reqwest` or `reqwest_middleware`
    /// libraries.
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest_middleware::Error),

    /// The provider answered with a non-success status.
    #[error("Notification failed: {0}")]
    NotifyFailed(String),
}
