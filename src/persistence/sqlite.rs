//! SQLite-backed implementation of [`ObserverRepository`].

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::Row;

use super::error::PersistenceError;
use super::traits::ObserverRepository;
use crate::models::{
    ConditionSpec, ConnectionCredentials, MonitoredTable, NotificationChannels, Observer,
    ObserverJob, ObserverLogEntry, StoredConnection,
};
use crate::secrets::CredentialCipher;

/// The app's own store: connections, tables, observers and logs in SQLite.
pub struct SqliteObserverRepository {
    pool: SqlitePool,
    cipher: CredentialCipher,
}

impl SqliteObserverRepository {
    /// Connects to the store, creating the database file if missing.
    #[tracing::instrument(level = "info", skip(cipher))]
    pub async fn new(
        database_url: &str,
        cipher: CredentialCipher,
    ) -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| PersistenceError::InvalidInput(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            PersistenceError::OperationFailed(format!("Failed to connect to database: {e}"))
        })?;
        tracing::info!(database_url, "Connected to tablewatch store.");
        Ok(Self { pool, cipher })
    }

    /// Runs database migrations.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn run_migrations(&self) -> Result<(), PersistenceError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to run database migrations.");
                PersistenceError::MigrationError(e.to_string())
            })?;
        tracing::debug!("Database migrations completed.");
        Ok(())
    }

    /// Access to the underlying pool, for advanced operations.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes the connection pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn get_connection(
        &self,
        connection_id: i64,
    ) -> Result<StoredConnection, PersistenceError> {
        let row = sqlx::query(
            "SELECT id, name, host, port, database_name, username, password_enc
             FROM connections WHERE id = ?",
        )
        .bind(connection_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| PersistenceError::NotFound(format!("connection {connection_id}")))?;
        connection_from_row(&row)
    }

    async fn get_monitored_table(&self, table_id: i64) -> Result<MonitoredTable, PersistenceError> {
        let row = sqlx::query(
            "SELECT id, connection_id, name, table_name, primary_key, fields, editable_fields,
                    input_types, position, is_active
             FROM monitored_tables WHERE id = ?",
        )
        .bind(table_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| PersistenceError::NotFound(format!("monitored table {table_id}")))?;
        table_from_row(&row)
    }

    fn credentials_for(
        &self,
        connection: &StoredConnection,
    ) -> Result<ConnectionCredentials, PersistenceError> {
        let password = self.cipher.decrypt(&connection.password_enc)?;
        Ok(ConnectionCredentials {
            host: connection.host.clone(),
            port: connection.port,
            database: connection.database_name.clone(),
            username: connection.username.clone(),
            password,
        })
    }

    async fn job_for(&self, observer: Observer) -> Result<ObserverJob, PersistenceError> {
        let table = self.get_monitored_table(observer.monitored_table_id).await?;
        let connection = self.get_connection(table.connection_id).await?;
        let credentials = self.credentials_for(&connection)?;
        Ok(ObserverJob {
            observer,
            table,
            credentials,
        })
    }
}

#[async_trait]
impl ObserverRepository for SqliteObserverRepository {
    async fn create_connection(
        &self,
        connection: StoredConnection,
        password: String,
    ) -> Result<StoredConnection, PersistenceError> {
        let password_enc = self.cipher.encrypt(&password);
        let result = sqlx::query(
            "INSERT INTO connections (name, host, port, database_name, username, password_enc)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&connection.name)
        .bind(&connection.host)
        .bind(connection.port)
        .bind(&connection.database_name)
        .bind(&connection.username)
        .bind(&password_enc)
        .execute(&self.pool)
        .await?;

        Ok(StoredConnection {
            id: result.last_insert_rowid(),
            password_enc,
            ..connection
        })
    }

    async fn delete_connection(&self, connection_id: i64) -> Result<(), PersistenceError> {
        let result = sqlx::query("DELETE FROM connections WHERE id = ?")
            .bind(connection_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound(format!(
                "connection {connection_id}"
            )));
        }
        Ok(())
    }

    async fn list_connections(&self) -> Result<Vec<StoredConnection>, PersistenceError> {
        let rows = sqlx::query(
            "SELECT id, name, host, port, database_name, username, password_enc
             FROM connections ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(connection_from_row).collect()
    }

    async fn connection_credentials(
        &self,
        connection_id: i64,
    ) -> Result<ConnectionCredentials, PersistenceError> {
        let connection = self.get_connection(connection_id).await?;
        self.credentials_for(&connection)
    }

    async fn create_monitored_table(
        &self,
        table: MonitoredTable,
    ) -> Result<MonitoredTable, PersistenceError> {
        let result = sqlx::query(
            "INSERT INTO monitored_tables
                 (connection_id, name, table_name, primary_key, fields, editable_fields,
                  input_types, position, is_active)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(table.connection_id)
        .bind(&table.name)
        .bind(&table.table_name)
        .bind(&table.primary_key)
        .bind(serde_json::to_string(&table.fields)?)
        .bind(serde_json::to_string(&table.editable_fields)?)
        .bind(serde_json::to_string(&table.input_types)?)
        .bind(table.position)
        .bind(table.is_active)
        .execute(&self.pool)
        .await?;

        Ok(MonitoredTable {
            id: result.last_insert_rowid(),
            ..table
        })
    }

    async fn create_observer(&self, observer: Observer) -> Result<Observer, PersistenceError> {
        let result = sqlx::query(
            "INSERT INTO observers
                 (monitored_table_id, name, field_to_watch, condition_type, threshold_value,
                  string_value, date_field_type, days_before_alert, days_after_alert,
                  alert_on_expired, date_format, is_active, notification_emails,
                  telegram_chat_ids, telegram_bot_token, notification_subject,
                  notification_message, check_interval_minutes, last_checked_at,
                  last_triggered_at, trigger_count)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(observer.monitored_table_id)
        .bind(&observer.name)
        .bind(&observer.field_to_watch)
        .bind(observer.condition.condition_type())
        .bind(observer.condition.threshold_value())
        .bind(observer.condition.string_value())
        .bind(observer.condition.date_params().map(|p| p.field_type.as_str()))
        .bind(observer.condition.date_params().map(|p| p.days_before_alert))
        .bind(observer.condition.date_params().map(|p| p.days_after_alert))
        .bind(observer.condition.date_params().map(|p| p.alert_on_expired))
        .bind(
            observer
                .condition
                .date_params()
                .and_then(|p| p.format.clone()),
        )
        .bind(observer.is_active)
        .bind(serde_json::to_string(&observer.channels.emails)?)
        .bind(serde_json::to_string(&observer.channels.telegram_chat_ids)?)
        .bind(observer.channels.telegram_bot_token.as_deref())
        .bind(&observer.notification_subject)
        .bind(&observer.notification_message)
        .bind(observer.check_interval_minutes)
        .bind(observer.last_checked_at)
        .bind(observer.last_triggered_at)
        .bind(observer.trigger_count)
        .execute(&self.pool)
        .await?;

        Ok(Observer {
            id: result.last_insert_rowid(),
            ..observer
        })
    }

    async fn update_observer(&self, observer: Observer) -> Result<(), PersistenceError> {
        let result = sqlx::query(
            "UPDATE observers SET
                 name = ?, field_to_watch = ?, condition_type = ?, threshold_value = ?,
                 string_value = ?, date_field_type = ?, days_before_alert = ?,
                 days_after_alert = ?, alert_on_expired = ?, date_format = ?, is_active = ?,
                 notification_emails = ?, telegram_chat_ids = ?, telegram_bot_token = ?,
                 notification_subject = ?, notification_message = ?, check_interval_minutes = ?
             WHERE id = ?",
        )
        .bind(&observer.name)
        .bind(&observer.field_to_watch)
        .bind(observer.condition.condition_type())
        .bind(observer.condition.threshold_value())
        .bind(observer.condition.string_value())
        .bind(observer.condition.date_params().map(|p| p.field_type.as_str()))
        .bind(observer.condition.date_params().map(|p| p.days_before_alert))
        .bind(observer.condition.date_params().map(|p| p.days_after_alert))
        .bind(observer.condition.date_params().map(|p| p.alert_on_expired))
        .bind(
            observer
                .condition
                .date_params()
                .and_then(|p| p.format.clone()),
        )
        .bind(observer.is_active)
        .bind(serde_json::to_string(&observer.channels.emails)?)
        .bind(serde_json::to_string(&observer.channels.telegram_chat_ids)?)
        .bind(observer.channels.telegram_bot_token.as_deref())
        .bind(&observer.notification_subject)
        .bind(&observer.notification_message)
        .bind(observer.check_interval_minutes)
        .bind(observer.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound(format!(
                "observer {}",
                observer.id
            )));
        }
        Ok(())
    }

    async fn delete_observer(&self, observer_id: i64) -> Result<(), PersistenceError> {
        let result = sqlx::query("DELETE FROM observers WHERE id = ?")
            .bind(observer_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound(format!(
                "observer {observer_id}"
            )));
        }
        Ok(())
    }

    async fn load_active_observers(&self) -> Result<Vec<ObserverJob>, PersistenceError> {
        let rows = sqlx::query(OBSERVER_COLUMNS_WHERE_ACTIVE)
            .fetch_all(&self.pool)
            .await?;

        let mut jobs = Vec::with_capacity(rows.len());
        for row in &rows {
            let observer = observer_from_row(row)?;
            jobs.push(self.job_for(observer).await?);
        }
        Ok(jobs)
    }

    async fn get_observer_job(&self, observer_id: i64) -> Result<ObserverJob, PersistenceError> {
        let row = sqlx::query(OBSERVER_COLUMNS_BY_ID)
            .bind(observer_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PersistenceError::NotFound(format!("observer {observer_id}")))?;
        let observer = observer_from_row(&row)?;
        self.job_for(observer).await
    }

    async fn insert_log_entry(&self, entry: ObserverLogEntry) -> Result<i64, PersistenceError> {
        let sent_to = entry
            .notification_sent_to
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let result = sqlx::query(
            "INSERT INTO observer_logs
                 (observer_id, record_id, current_value, current_string_value,
                  current_date_value, condition_met, details, notification_sent_to, sent_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.observer_id)
        .bind(&entry.record_id)
        .bind(entry.current_value)
        .bind(entry.current_string_value.as_deref())
        .bind(entry.current_date_value)
        .bind(entry.condition_met)
        .bind(&entry.details)
        .bind(sent_to)
        .bind(entry.sent_at)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn mark_log_notified(
        &self,
        log_id: i64,
        sent_to: Vec<String>,
        sent_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        let result =
            sqlx::query("UPDATE observer_logs SET notification_sent_to = ?, sent_at = ? WHERE id = ?")
                .bind(serde_json::to_string(&sent_to)?)
                .bind(sent_at)
                .bind(log_id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound(format!("log entry {log_id}")));
        }
        Ok(())
    }

    async fn log_entries_for(
        &self,
        observer_id: i64,
    ) -> Result<Vec<ObserverLogEntry>, PersistenceError> {
        let rows = sqlx::query(
            "SELECT id, observer_id, record_id, current_value, current_string_value,
                    current_date_value, condition_met, details, notification_sent_to, sent_at
             FROM observer_logs WHERE observer_id = ? ORDER BY id",
        )
        .bind(observer_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(log_entry_from_row).collect()
    }

    async fn last_notification_for(
        &self,
        observer_id: i64,
        record_id: &str,
    ) -> Result<Option<DateTime<Utc>>, PersistenceError> {
        let row = sqlx::query(
            "SELECT sent_at FROM observer_logs
             WHERE observer_id = ? AND record_id = ? AND sent_at IS NOT NULL
             ORDER BY sent_at DESC LIMIT 1",
        )
        .bind(observer_id)
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row
            .map(|r| r.try_get::<DateTime<Utc>, _>("sent_at"))
            .transpose()?)
    }

    async fn complete_sweep(
        &self,
        observer_id: i64,
        checked_at: DateTime<Utc>,
        met_rows: i64,
    ) -> Result<(), PersistenceError> {
        let result = sqlx::query(
            "UPDATE observers SET
                 last_checked_at = ?,
                 last_triggered_at = CASE WHEN ? > 0 THEN ? ELSE last_triggered_at END,
                 trigger_count = trigger_count + ?
             WHERE id = ?",
        )
        .bind(checked_at)
        .bind(met_rows)
        .bind(checked_at)
        .bind(met_rows)
        .bind(observer_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound(format!(
                "observer {observer_id}"
            )));
        }
        Ok(())
    }
}

const OBSERVER_COLUMNS: &str = "SELECT id, monitored_table_id, name, field_to_watch, \
     condition_type, threshold_value, string_value, date_field_type, days_before_alert, \
     days_after_alert, alert_on_expired, date_format, is_active, notification_emails, \
     telegram_chat_ids, telegram_bot_token, notification_subject, notification_message, \
     check_interval_minutes, last_checked_at, last_triggered_at, trigger_count FROM observers";

const OBSERVER_COLUMNS_WHERE_ACTIVE: &str = "SELECT id, monitored_table_id, name, field_to_watch, \
     condition_type, threshold_value, string_value, date_field_type, days_before_alert, \
     days_after_alert, alert_on_expired, date_format, is_active, notification_emails, \
     telegram_chat_ids, telegram_bot_token, notification_subject, notification_message, \
     check_interval_minutes, last_checked_at, last_triggered_at, trigger_count FROM observers \
     WHERE is_active = 1 ORDER BY id";

const OBSERVER_COLUMNS_BY_ID: &str = "SELECT id, monitored_table_id, name, field_to_watch, \
     condition_type, threshold_value, string_value, date_field_type, days_before_alert, \
     days_after_alert, alert_on_expired, date_format, is_active, notification_emails, \
     telegram_chat_ids, telegram_bot_token, notification_subject, notification_message, \
     check_interval_minutes, last_checked_at, last_triggered_at, trigger_count FROM observers \
     WHERE id = ?";

fn connection_from_row(row: &SqliteRow) -> Result<StoredConnection, PersistenceError> {
    Ok(StoredConnection {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        host: row.try_get("host")?,
        port: row.try_get("port")?,
        database_name: row.try_get("database_name")?,
        username: row.try_get("username")?,
        password_enc: row.try_get("password_enc")?,
    })
}

fn table_from_row(row: &SqliteRow) -> Result<MonitoredTable, PersistenceError> {
    Ok(MonitoredTable {
        id: row.try_get("id")?,
        connection_id: row.try_get("connection_id")?,
        name: row.try_get("name")?,
        table_name: row.try_get("table_name")?,
        primary_key: row.try_get("primary_key")?,
        fields: serde_json::from_str(row.try_get::<&str, _>("fields")?)?,
        editable_fields: serde_json::from_str(row.try_get::<&str, _>("editable_fields")?)?,
        input_types: serde_json::from_str(row.try_get::<&str, _>("input_types")?)?,
        position: row.try_get("position")?,
        is_active: row.try_get("is_active")?,
    })
}

fn observer_from_row(row: &SqliteRow) -> Result<Observer, PersistenceError> {
    let condition_type: String = row.try_get("condition_type")?;
    let condition = ConditionSpec::from_columns(
        &condition_type,
        row.try_get("threshold_value")?,
        row.try_get("string_value")?,
        row.try_get("date_field_type")?,
        row.try_get("days_before_alert")?,
        row.try_get("days_after_alert")?,
        row.try_get("alert_on_expired")?,
        row.try_get("date_format")?,
    );

    Ok(Observer {
        id: row.try_get("id")?,
        monitored_table_id: row.try_get("monitored_table_id")?,
        name: row.try_get("name")?,
        field_to_watch: row.try_get("field_to_watch")?,
        condition,
        is_active: row.try_get("is_active")?,
        check_interval_minutes: row.try_get("check_interval_minutes")?,
        channels: NotificationChannels {
            emails: serde_json::from_str(row.try_get::<&str, _>("notification_emails")?)?,
            telegram_chat_ids: serde_json::from_str(row.try_get::<&str, _>("telegram_chat_ids")?)?,
            telegram_bot_token: row.try_get("telegram_bot_token")?,
        },
        notification_subject: row.try_get("notification_subject")?,
        notification_message: row.try_get("notification_message")?,
        last_checked_at: row.try_get("last_checked_at")?,
        last_triggered_at: row.try_get("last_triggered_at")?,
        trigger_count: row.try_get("trigger_count")?,
    })
}

fn log_entry_from_row(row: &SqliteRow) -> Result<ObserverLogEntry, PersistenceError> {
    let sent_to: Option<String> = row.try_get("notification_sent_to")?;
    Ok(ObserverLogEntry {
        id: row.try_get("id")?,
        observer_id: row.try_get("observer_id")?,
        record_id: row.try_get("record_id")?,
        current_value: row.try_get("current_value")?,
        current_string_value: row.try_get("current_string_value")?,
        current_date_value: row.try_get("current_date_value")?,
        condition_met: row.try_get("condition_met")?,
        details: row.try_get("details")?,
        notification_sent_to: sent_to.map(|s| serde_json::from_str(&s)).transpose()?,
        sent_at: row.try_get("sent_at")?,
    })
}
