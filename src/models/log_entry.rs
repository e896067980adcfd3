//! Append-only evaluation log entries.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::FieldValue;

/// One evaluation of one observer against one row.
///
/// Entries are append-only; the only permitted mutation is attaching
/// `notification_sent_to` / `sent_at` after a successful send attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObserverLogEntry {
    /// Unique identifier (auto-assigned on insert).
    #[serde(default)]
    pub id: i64,
    /// The observer that produced this entry.
    pub observer_id: i64,
    /// The scanned row's primary-key value, as a string.
    pub record_id: String,
    /// The watched value when numeric. Mutually exclusive with the string
    /// and date forms.
    pub current_value: Option<f64>,
    /// The watched value when textual.
    pub current_string_value: Option<String>,
    /// The watched value when temporal.
    pub current_date_value: Option<NaiveDateTime>,
    /// Whether the condition held for this row.
    pub condition_met: bool,
    /// Free-text evaluation details for operators.
    pub details: String,
    /// Destinations actually notified; `None` until a send succeeds.
    pub notification_sent_to: Option<Vec<String>>,
    /// When the notification was delivered.
    pub sent_at: Option<DateTime<Utc>>,
}

impl ObserverLogEntry {
    /// Builds a fresh (unsent) entry from an evaluated row value.
    ///
    /// Exactly one of the three current-value columns is populated,
    /// matching the tagged [`FieldValue`].
    pub fn from_evaluation(
        observer_id: i64,
        record_id: impl Into<String>,
        value: &FieldValue,
        condition_met: bool,
        details: impl Into<String>,
    ) -> Self {
        let (current_value, current_string_value, current_date_value) = match value {
            FieldValue::Null => (None, None, None),
            FieldValue::Number(n) => (Some(*n), None, None),
            FieldValue::Text(s) => (None, Some(s.clone()), None),
            FieldValue::Date(d) => (None, None, Some(*d)),
        };
        Self {
            id: 0,
            observer_id,
            record_id: record_id.into(),
            current_value,
            current_string_value,
            current_date_value,
            condition_met,
            details: details.into(),
            notification_sent_to: None,
            sent_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_value_column_is_populated() {
        let numeric =
            ObserverLogEntry::from_evaluation(1, "42", &FieldValue::Number(9.5), true, "met");
        assert_eq!(numeric.current_value, Some(9.5));
        assert!(numeric.current_string_value.is_none());
        assert!(numeric.current_date_value.is_none());

        let text =
            ObserverLogEntry::from_evaluation(1, "42", &FieldValue::Text("hi".into()), false, "");
        assert!(text.current_value.is_none());
        assert_eq!(text.current_string_value.as_deref(), Some("hi"));

        let null = ObserverLogEntry::from_evaluation(1, "42", &FieldValue::Null, false, "");
        assert!(null.current_value.is_none());
        assert!(null.current_string_value.is_none());
        assert!(null.current_date_value.is_none());
    }
}
