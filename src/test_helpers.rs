//! A set of helpers for testing.

use chrono::{DateTime, Utc};

use crate::models::{
    ConditionSpec, ConnectionCredentials, FieldValue, MonitoredTable, NotificationChannels,
    NumericOp, Observer, ObserverJob,
};
use crate::provider::ScannedRow;

/// A builder for creating [`Observer`] instances for testing.
#[derive(Debug, Clone)]
pub struct ObserverBuilder {
    observer: Observer,
}

impl ObserverBuilder {
    /// Creates a builder with sensible defaults: an active numeric observer
    /// watching `quantity < 10` on table mapping 1, hourly.
    pub fn new() -> Self {
        Self {
            observer: Observer {
                id: 1,
                monitored_table_id: 1,
                name: "low stock".into(),
                field_to_watch: "quantity".into(),
                condition: ConditionSpec::Numeric {
                    op: NumericOp::LessThan,
                    threshold: 10.0,
                },
                is_active: true,
                check_interval_minutes: 60,
                channels: NotificationChannels::default(),
                notification_subject: String::new(),
                notification_message: String::new(),
                last_checked_at: None,
                last_triggered_at: None,
                trigger_count: 0,
            },
        }
    }

    /// Sets the observer id.
    pub fn id(mut self, id: i64) -> Self {
        self.observer.id = id;
        self
    }

    /// Sets the owning table mapping id.
    pub fn monitored_table_id(mut self, id: i64) -> Self {
        self.observer.monitored_table_id = id;
        self
    }

    /// Sets the display name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.observer.name = name.into();
        self
    }

    /// Sets the watched column.
    pub fn field_to_watch(mut self, field: impl Into<String>) -> Self {
        self.observer.field_to_watch = field.into();
        self
    }

    /// Sets the condition.
    pub fn condition(mut self, condition: ConditionSpec) -> Self {
        self.observer.condition = condition;
        self
    }

    /// Sets the active flag.
    pub fn active(mut self, active: bool) -> Self {
        self.observer.is_active = active;
        self
    }

    /// Sets the check interval in minutes.
    pub fn interval_minutes(mut self, minutes: i64) -> Self {
        self.observer.check_interval_minutes = minutes;
        self
    }

    /// Sets the last scheduled check time.
    pub fn last_checked_at(mut self, at: DateTime<Utc>) -> Self {
        self.observer.last_checked_at = Some(at);
        self
    }

    /// Sets the notification destinations.
    pub fn channels(mut self, channels: NotificationChannels) -> Self {
        self.observer.channels = channels;
        self
    }

    /// Sets the subject and body templates.
    pub fn templates(
        mut self,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        self.observer.notification_subject = subject.into();
        self.observer.notification_message = body.into();
        self
    }

    /// Builds the observer.
    pub fn build(self) -> Observer {
        self.observer
    }
}

impl Default for ObserverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A table mapping matching [`ObserverBuilder`]'s defaults.
pub fn products_table() -> MonitoredTable {
    MonitoredTable {
        id: 1,
        ..MonitoredTable::new(1, "Products", "products", "id")
    }
}

/// Throwaway credentials for tests that never actually connect.
pub fn test_credentials() -> ConnectionCredentials {
    ConnectionCredentials {
        host: "db.example.com".into(),
        port: 3306,
        database: "shop".into(),
        username: "reader".into(),
        password: "s3cret".into(),
    }
}

/// Joins an observer with the default table and credentials.
pub fn observer_job(observer: Observer) -> ObserverJob {
    ObserverJob {
        observer,
        table: products_table(),
        credentials: test_credentials(),
    }
}

/// A scanned row with an `id` column and one watched value.
pub fn row(id: i64, column: &str, value: FieldValue) -> ScannedRow {
    ScannedRow::from_pairs(vec![
        ("id".into(), FieldValue::Number(id as f64)),
        (column.into(), value),
    ])
}
