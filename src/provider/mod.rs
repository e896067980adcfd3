//! Dynamic access to user-owned external datastores.
//!
//! Every observer points at a table in somebody else's MySQL database.
//! Nothing about those schemas is known at compile time, so scans return
//! ordered column-name → [`FieldValue`](crate::models::FieldValue) mappings
//! and the watched column is resolved by name at runtime.
//!
//! Connection handles are pooled per credential fingerprint. Two observers
//! with different credentials can never share or overwrite a handle, which
//! keeps future cross-observer concurrency safe.

pub mod error;
pub mod mysql;
pub mod row;
pub mod traits;

pub use error::ProviderError;
pub use mysql::MySqlTableScanner;
pub use row::ScannedRow;
pub use traits::TableScanner;

#[cfg(test)]
pub use traits::MockTableScanner;
