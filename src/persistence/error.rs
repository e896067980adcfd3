//! Error types for the app's own persistence layer.

use thiserror::Error;

/// Errors that can occur in the persistence layer.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// A data store operation failed.
    #[error("A data store operation failed: {0}")]
    OperationFailed(String),

    /// The requested item was not found.
    #[error("The requested item was not found: {0}")]
    NotFound(String),

    /// Serialization or deserialization of a JSON column failed.
    #[error("Failed to serialize or deserialize data: {0}")]
    SerializationError(String),

    /// A database migration failed.
    #[error("A data migration failed: {0}")]
    MigrationError(String),

    /// Invalid input, e.g. a uniqueness violation.
    #[error("An invalid configuration or input was provided: {0}")]
    InvalidInput(String),

    /// The item already exists (unique constraint).
    #[error("Item already exists: {0}")]
    AlreadyExists(String),

    /// Stored credentials could not be decrypted.
    #[error("Failed to decrypt stored credentials: {0}")]
    CredentialDecryption(#[from] crate::secrets::CipherError),
}

impl From<sqlx::Error> for PersistenceError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => PersistenceError::NotFound(e.to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PersistenceError::AlreadyExists(e.to_string())
            }
            _ => PersistenceError::OperationFailed(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        PersistenceError::SerializationError(e.to_string())
    }
}
