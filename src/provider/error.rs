//! Error taxonomy for external datastore access.

use thiserror::Error;

/// Errors raised while talking to a user's external datastore.
///
/// The distinction matters to operators: `Connection` means the stored
/// credentials or the network are bad, `Query` means the user's schema no
/// longer matches its configuration (e.g. a table renamed out-of-band).
/// Both are caught at the per-observer boundary in the scheduler.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Credentials invalid or datastore unreachable.
    #[error("failed to connect to external datastore: {0}")]
    Connection(String),

    /// The query failed against the user-defined schema.
    #[error("query against external datastore failed: {0}")]
    Query(String),
}

impl ProviderError {
    /// Classifies an underlying sqlx error into the provider taxonomy.
    pub fn from_sqlx(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Configuration(_) => ProviderError::Connection(e.to_string()),
            sqlx::Error::Database(db) => {
                // SQLSTATE class 08 = connection exception, 28 = invalid
                // authorization (bad username/password).
                let sqlstate = db.code().unwrap_or_default();
                if sqlstate.starts_with("08") || sqlstate.starts_with("28") {
                    ProviderError::Connection(e.to_string())
                } else {
                    ProviderError::Query(e.to_string())
                }
            }
            _ => ProviderError::Query(e.to_string()),
        }
    }
}
