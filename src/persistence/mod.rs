//! The app's own persistence layer: SQLite-backed storage for connections,
//! monitored tables, observers and their run logs.

pub mod error;
pub mod sqlite;
pub mod traits;

pub use error::PersistenceError;
pub use sqlite::SqliteObserverRepository;
pub use traits::ObserverRepository;

#[cfg(test)]
pub use traits::MockObserverRepository;
