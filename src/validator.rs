//! Pre-persistence validation of observer configurations.
//!
//! The repository stores whatever it is given; everything that must hold
//! before an observer is allowed to exist is checked here, once, at create
//! and update time.

use thiserror::Error;

use crate::models::{ConditionSpec, Observer};

/// Shortest permitted check interval, in minutes.
pub const MIN_INTERVAL_MINUTES: i64 = 1;
/// Longest permitted check interval, in minutes (one day).
pub const MAX_INTERVAL_MINUTES: i64 = 1440;

/// A reason an observer configuration was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The display name is empty.
    #[error("Observer name must not be empty")]
    EmptyName,

    /// The watched column is empty.
    #[error("Field to watch must not be empty")]
    EmptyField,

    /// The check interval is outside the permitted range.
    #[error(
        "Check interval must be between {MIN_INTERVAL_MINUTES} and {MAX_INTERVAL_MINUTES} \
         minutes, got {got}"
    )]
    IntervalOutOfRange {
        /// The rejected interval.
        got: i64,
    },

    /// No deliverable notification channel is configured.
    #[error("At least one notification channel must be configured")]
    NoNotificationChannel,

    /// Telegram chat ids are configured without a bot token.
    #[error("Telegram chat ids are configured but the bot token is missing")]
    TelegramTokenMissing,

    /// An email recipient is not a plausible address.
    #[error("Invalid email address: {address}")]
    InvalidEmail {
        /// The rejected address.
        address: String,
    },

    /// The condition decoded to something this build cannot evaluate.
    #[error("Unsupported condition type: {condition_type}")]
    UnsupportedCondition {
        /// The raw condition type string.
        condition_type: String,
    },
}

/// Validates observers before they reach the repository.
pub struct ObserverValidator;

impl ObserverValidator {
    /// Checks every invariant, failing on the first violation.
    pub fn validate(observer: &Observer) -> Result<(), ValidationError> {
        if observer.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if observer.field_to_watch.trim().is_empty() {
            return Err(ValidationError::EmptyField);
        }
        if !(MIN_INTERVAL_MINUTES..=MAX_INTERVAL_MINUTES)
            .contains(&observer.check_interval_minutes)
        {
            return Err(ValidationError::IntervalOutOfRange {
                got: observer.check_interval_minutes,
            });
        }

        if let ConditionSpec::Unsupported { condition_type } = &observer.condition {
            return Err(ValidationError::UnsupportedCondition {
                condition_type: condition_type.clone(),
            });
        }

        let channels = &observer.channels;
        if !channels.telegram_chat_ids.is_empty() && !channels.telegram_configured() {
            return Err(ValidationError::TelegramTokenMissing);
        }
        if !channels.has_any() {
            return Err(ValidationError::NoNotificationChannel);
        }
        for address in &channels.emails {
            if !is_plausible_email(address) {
                return Err(ValidationError::InvalidEmail {
                    address: address.clone(),
                });
            }
        }
        Ok(())
    }
}

/// A minimal shape check; the SMTP relay is the real authority.
fn is_plausible_email(address: &str) -> bool {
    match address.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.'),
        None => false,
    }
}
