//! MySQL implementation of [`TableScanner`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::ToPrimitive;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::types::BigDecimal;
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tokio::sync::RwLock;

use super::{ProviderError, ScannedRow, TableScanner};
use crate::models::{ConnectionCredentials, FieldValue};

/// Scans tables in user-owned MySQL databases.
///
/// Pools are created lazily and keyed by credential fingerprint, so each
/// distinct credential set gets its own isolated handle.
pub struct MySqlTableScanner {
    pools: Arc<RwLock<HashMap<String, MySqlPool>>>,
    connect_timeout: Duration,
    max_connections: u32,
}

impl MySqlTableScanner {
    /// Creates a scanner with the given per-pool bounds.
    pub fn new(connect_timeout: Duration, max_connections: u32) -> Self {
        Self {
            pools: Arc::new(RwLock::new(HashMap::new())),
            connect_timeout,
            max_connections,
        }
    }

    async fn pool_for(
        &self,
        credentials: &ConnectionCredentials,
    ) -> Result<MySqlPool, ProviderError> {
        let key = credentials.fingerprint();

        if let Some(pool) = self.pools.read().await.get(&key) {
            return Ok(pool.clone());
        }

        let mut pools = self.pools.write().await;
        if let Some(pool) = pools.get(&key) {
            return Ok(pool.clone());
        }

        let options = MySqlConnectOptions::new()
            .host(&credentials.host)
            .port(credentials.port)
            .username(&credentials.username)
            .password(&credentials.password)
            .database(&credentials.database);

        let pool = MySqlPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.connect_timeout)
            .connect_with(options)
            .await
            .map_err(ProviderError::from_sqlx)?;

        tracing::debug!(
            host = %credentials.host,
            database = %credentials.database,
            "Opened connection pool for external datastore."
        );
        pools.insert(key, pool.clone());
        Ok(pool)
    }
}

#[async_trait]
impl TableScanner for MySqlTableScanner {
    async fn scan(
        &self,
        credentials: &ConnectionCredentials,
        table_name: &str,
        columns: &[String],
        limit: Option<u32>,
    ) -> Result<Vec<ScannedRow>, ProviderError> {
        let pool = self.pool_for(credentials).await?;

        let column_list = columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        // No ORDER BY: rows are processed in whatever order the engine
        // yields. Identifiers are quoted; there is no value interpolation.
        let mut sql = format!(
            "SELECT {column_list} FROM {}",
            quote_identifier(table_name)
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let rows = sqlx::query(&sql)
            .fetch_all(&pool)
            .await
            .map_err(ProviderError::from_sqlx)?;

        rows.iter()
            .map(|row| decode_row(row).map_err(ProviderError::from_sqlx))
            .collect()
    }

    async fn ping(&self, credentials: &ConnectionCredentials) -> Result<(), ProviderError> {
        let pool = self.pool_for(credentials).await?;
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(ProviderError::from_sqlx)?;
        Ok(())
    }
}

/// Backtick-quotes a MySQL identifier, escaping embedded backticks.
fn quote_identifier(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

fn decode_row(row: &MySqlRow) -> Result<ScannedRow, sqlx::Error> {
    let mut pairs = Vec::with_capacity(row.columns().len());
    for (idx, column) in row.columns().iter().enumerate() {
        pairs.push((column.name().to_string(), decode_cell(row, idx)?));
    }
    Ok(ScannedRow::from_pairs(pairs))
}

/// Decodes one cell into its tagged value based on the column's MySQL type.
fn decode_cell(row: &MySqlRow, idx: usize) -> Result<FieldValue, sqlx::Error> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(FieldValue::Null);
    }

    let type_name = row.columns()[idx].type_info().name();
    let value = match type_name {
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            FieldValue::Number(row.try_get::<i64, _>(idx)? as f64)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => FieldValue::Number(row.try_get::<u64, _>(idx)? as f64),
        "BOOLEAN" => FieldValue::Number(row.try_get::<bool, _>(idx)? as i64 as f64),
        "FLOAT" => FieldValue::Number(row.try_get::<f32, _>(idx)? as f64),
        "DOUBLE" => FieldValue::Number(row.try_get::<f64, _>(idx)?),
        "DECIMAL" => {
            let decimal: BigDecimal = row.try_get(idx)?;
            match decimal.to_f64() {
                Some(n) => FieldValue::Number(n),
                // Out of f64 range; fall back to the textual form so string
                // conditions still see it.
                None => FieldValue::Text(decimal.to_string()),
            }
        }
        "DATE" => {
            let date: NaiveDate = row.try_get(idx)?;
            FieldValue::Date(date.and_time(NaiveTime::MIN))
        }
        "DATETIME" => FieldValue::Date(row.try_get::<NaiveDateTime, _>(idx)?),
        "TIMESTAMP" => {
            let ts: DateTime<Utc> = row.try_get(idx)?;
            FieldValue::Date(ts.naive_utc())
        }
        _ => FieldValue::Text(row.try_get::<String, _>(idx)?),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_quoting_escapes_backticks() {
        assert_eq!(quote_identifier("orders"), "`orders`");
        assert_eq!(quote_identifier("weird`name"), "`weird``name`");
    }
}
