//! The scan interface the scheduler depends on.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::{ProviderError, ScannedRow};
use crate::models::ConnectionCredentials;

/// Read access to an arbitrary external table.
///
/// Implementations own their connection handling; callers supply credentials
/// per call and never hold a handle themselves.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TableScanner: Send + Sync {
    /// Selects the named columns for every row of `table_name`, in the
    /// order the datastore yields them. `limit` caps the scan when set
    /// (used by the force-test path).
    async fn scan(
        &self,
        credentials: &ConnectionCredentials,
        table_name: &str,
        columns: &[String],
        limit: Option<u32>,
    ) -> Result<Vec<ScannedRow>, ProviderError>;

    /// Verifies the credentials can reach the datastore at all.
    async fn ping(&self, credentials: &ConnectionCredentials) -> Result<(), ProviderError>;
}
