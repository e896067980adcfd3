//! Data structures shared across the tablewatch engine.

pub mod connection;
pub mod dispatch;
pub mod field_value;
pub mod log_entry;
pub mod observer;
pub mod table;

pub use connection::{ConnectionCredentials, StoredConnection};
pub use dispatch::{ChannelReport, DestinationResult, DispatchReport, NotificationContext};
pub use field_value::FieldValue;
pub use log_entry::ObserverLogEntry;
pub use observer::{
    ConditionSpec, ConditionType, DateFieldType, DateOp, DateParams, ExpectedValue,
    NotificationChannels, NumericOp, Observer, ObserverJob, TextOp,
};
pub use table::MonitoredTable;
