//! The repository interface for tablewatch's own entities.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;

use super::error::PersistenceError;
use crate::models::{
    ConnectionCredentials, MonitoredTable, Observer, ObserverJob, ObserverLogEntry,
    StoredConnection,
};

/// Storage for connections, monitored tables, observers and their logs.
///
/// Connection passwords cross this boundary in plaintext exactly twice:
/// into `create_connection` (encrypted before hitting disk) and out of the
/// credentials inside an [`ObserverJob`] (decrypted on read).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObserverRepository: Send + Sync {
    // Connection lifecycle:

    /// Registers an external datastore connection. The plaintext password is
    /// encrypted at rest.
    async fn create_connection(
        &self,
        connection: StoredConnection,
        password: String,
    ) -> Result<StoredConnection, PersistenceError>;

    /// Deletes a connection; dependent tables, observers and logs cascade.
    async fn delete_connection(&self, connection_id: i64) -> Result<(), PersistenceError>;

    /// Lists all registered connections.
    async fn list_connections(&self) -> Result<Vec<StoredConnection>, PersistenceError>;

    /// Decrypted credentials for one connection, e.g. for a reachability
    /// check.
    async fn connection_credentials(
        &self,
        connection_id: i64,
    ) -> Result<ConnectionCredentials, PersistenceError>;

    // Table configuration:

    /// Creates a table mapping. `(connection_id, table_name)` is unique.
    async fn create_monitored_table(
        &self,
        table: MonitoredTable,
    ) -> Result<MonitoredTable, PersistenceError>;

    // Observer lifecycle:

    /// Persists a new observer. Callers validate first; see
    /// [`crate::validator::ObserverValidator`].
    async fn create_observer(&self, observer: Observer) -> Result<Observer, PersistenceError>;

    /// Rewrites an observer's policy fields.
    async fn update_observer(&self, observer: Observer) -> Result<(), PersistenceError>;

    /// Deletes an observer; its log entries cascade.
    async fn delete_observer(&self, observer_id: i64) -> Result<(), PersistenceError>;

    /// Loads every active observer joined with its table and decrypted
    /// credentials, ready to run.
    async fn load_active_observers(&self) -> Result<Vec<ObserverJob>, PersistenceError>;

    /// Loads one observer (active or not) joined for running.
    async fn get_observer_job(&self, observer_id: i64) -> Result<ObserverJob, PersistenceError>;

    // Run log:

    /// Appends one evaluation outcome; returns the new entry's id.
    async fn insert_log_entry(&self, entry: ObserverLogEntry) -> Result<i64, PersistenceError>;

    /// Attaches a delivery result to an existing entry. The only permitted
    /// log mutation.
    async fn mark_log_notified(
        &self,
        log_id: i64,
        sent_to: Vec<String>,
        sent_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError>;

    /// All log entries for one observer, insertion order.
    async fn log_entries_for(
        &self,
        observer_id: i64,
    ) -> Result<Vec<ObserverLogEntry>, PersistenceError>;

    /// When a notification was last sent for `(observer, record)`, if ever.
    /// Supports idempotent "was this already notified" checks.
    async fn last_notification_for(
        &self,
        observer_id: i64,
        record_id: &str,
    ) -> Result<Option<DateTime<Utc>>, PersistenceError>;

    // Scheduling bookkeeping:

    /// Commits one observer's bookkeeping after a scheduled pass:
    /// `last_checked_at = checked_at`, `last_triggered_at = checked_at` when
    /// any row met the condition, `trigger_count += met_rows`.
    async fn complete_sweep(
        &self,
        observer_id: i64,
        checked_at: DateTime<Utc>,
        met_rows: i64,
    ) -> Result<(), PersistenceError>;
}
