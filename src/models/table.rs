//! Monitored table configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A user-chosen mapping from a display name to a concrete table in an
/// external datastore.
///
/// `fields`, `editable_fields` and `input_types` describe what the (external)
/// CRUD grid exposes; the observer engine only needs `table_name` and
/// `primary_key`, but the full mapping is owned and persisted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoredTable {
    /// Unique identifier (auto-assigned on insert).
    #[serde(default)]
    pub id: i64,
    /// Owning connection id.
    pub connection_id: i64,
    /// Display name shown to the user.
    pub name: String,
    /// Actual table name in the external datastore. Unique per connection.
    pub table_name: String,
    /// Primary-key column name, resolved at runtime against scanned rows.
    pub primary_key: String,
    /// Exposed field names.
    #[serde(default)]
    pub fields: Vec<String>,
    /// Subset of `fields` marked editable.
    #[serde(default)]
    pub editable_fields: Vec<String>,
    /// Per-field input-type hint (e.g. "text", "number", "date").
    #[serde(default)]
    pub input_types: HashMap<String, String>,
    /// Display ordering among the connection's tables.
    #[serde(default)]
    pub position: i64,
    /// Whether the table is shown/used at all.
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl MonitoredTable {
    /// Creates a new table mapping without an id, ready for insertion.
    pub fn new(
        connection_id: i64,
        name: impl Into<String>,
        table_name: impl Into<String>,
        primary_key: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            connection_id,
            name: name.into(),
            table_name: table_name.into(),
            primary_key: primary_key.into(),
            fields: Vec::new(),
            editable_fields: Vec::new(),
            input_types: HashMap::new(),
            position: 0,
            is_active: true,
        }
    }
}
