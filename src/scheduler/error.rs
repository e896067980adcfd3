//! Error types for the observer scheduler.

use thiserror::Error;

use crate::persistence::PersistenceError;
use crate::provider::ProviderError;

/// Errors that can abort one observer's check (or a whole sweep, when the
/// app's own store is unreachable).
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The app's own store failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// The external datastore could not be scanned.
    #[error("Scan error: {0}")]
    Provider(#[from] ProviderError),
}
