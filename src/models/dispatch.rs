//! Notification dispatch inputs and per-destination outcomes.

use serde::{Deserialize, Serialize};

use super::NotificationChannels;

/// Everything the dispatcher needs to render and deliver one notification.
#[derive(Debug, Clone)]
pub struct NotificationContext {
    /// `{observer_name}` placeholder value.
    pub observer_name: String,
    /// `{table_name}` placeholder value.
    pub table_name: String,
    /// `{field}` placeholder value.
    pub field: String,
    /// `{condition}` placeholder value (human-readable condition).
    pub condition: String,
    /// `{current_value}` placeholder value.
    pub current_value: String,
    /// `{record_id}` placeholder value.
    pub record_id: String,
    /// Subject template.
    pub subject_template: String,
    /// Body template.
    pub body_template: String,
    /// Configured destinations.
    pub channels: NotificationChannels,
}

/// Outcome of one delivery attempt to one destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationResult {
    /// Email address or chat id.
    pub destination: String,
    /// Whether the send succeeded.
    pub success: bool,
    /// Failure detail, when `success` is false.
    pub error: Option<String>,
}

impl DestinationResult {
    /// A successful delivery.
    pub fn ok(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            success: true,
            error: None,
        }
    }

    /// A failed delivery with its error detail.
    pub fn failed(destination: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Per-destination outcomes for one channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelReport {
    /// One entry per destination attempted, in attempt order.
    pub results: Vec<DestinationResult>,
}

impl ChannelReport {
    /// True when at least one destination succeeded.
    pub fn succeeded(&self) -> bool {
        self.results.iter().any(|r| r.success)
    }

    /// Destinations that were actually delivered to.
    pub fn delivered(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|r| r.success)
            .map(|r| r.destination.as_str())
    }
}

/// The overall result of one dispatch: which channels were attempted and
/// how each destination fared. Failures live inside the report; dispatching
/// never returns an error to its caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    /// Email channel outcomes; `None` when the channel was not configured.
    pub email: Option<ChannelReport>,
    /// Telegram channel outcomes; `None` when the channel was not configured.
    pub telegram: Option<ChannelReport>,
}

impl DispatchReport {
    /// True when at least one destination on any channel succeeded.
    pub fn any_success(&self) -> bool {
        self.email.as_ref().is_some_and(ChannelReport::succeeded)
            || self.telegram.as_ref().is_some_and(ChannelReport::succeeded)
    }

    /// All destinations that were actually delivered to, across channels.
    pub fn sent_to(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(email) = &self.email {
            out.extend(email.delivered().map(String::from));
        }
        if let Some(telegram) = &self.telegram {
            out.extend(telegram.delivered().map(|c| format!("telegram:{c}")));
        }
        out
    }
}
