//! Runtime-typed row results.

use crate::models::FieldValue;

/// One scanned row: an ordered mapping from column name to tagged value.
///
/// Order is whatever the datastore yielded. `primary_key` and
/// `field_to_watch` are resolved against this mapping by name; a column
/// missing from the mapping (schema drift) surfaces as `None`, not a panic.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedRow {
    columns: Vec<(String, FieldValue)>,
}

impl ScannedRow {
    /// Builds a row from `(column name, value)` pairs in datastore order.
    pub fn from_pairs(columns: Vec<(String, FieldValue)>) -> Self {
        Self { columns }
    }

    /// Looks up a column by name.
    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Iterates columns in datastore order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.columns.iter().map(|(n, v)| (n.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name() {
        let row = ScannedRow::from_pairs(vec![
            ("id".into(), FieldValue::Number(1.0)),
            ("price".into(), FieldValue::Number(9.5)),
        ]);
        assert_eq!(row.get("price"), Some(&FieldValue::Number(9.5)));
        assert_eq!(row.get("missing"), None);
    }
}
