//! Tagged representation of a single cell read from a scanned table.
//!
//! Observed tables are user-defined, so column types are only known at
//! runtime. Every cell is decoded into a `FieldValue` so the evaluator can
//! reason about numeric, textual and temporal values uniformly.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A dynamically-typed cell value from an external table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    /// SQL NULL.
    Null,
    /// Any numeric column (integers, floats, decimals).
    Number(f64),
    /// Textual columns, and anything without a more specific decoding.
    Text(String),
    /// DATE / DATETIME / TIMESTAMP columns.
    Date(NaiveDateTime),
}

impl FieldValue {
    /// Returns the numeric interpretation of this value, if one exists.
    ///
    /// Textual values are parsed leniently (`"5"` is numeric, `"abc"` is
    /// not); NULL and dates have no numeric form.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// The canonical string form used for string conditions and templates.
    pub fn string_form(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            FieldValue::Text(s) => s.clone(),
            FieldValue::Date(d) => d.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// True for SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.string_form())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_interpretation() {
        assert_eq!(FieldValue::Number(5.0).as_number(), Some(5.0));
        assert_eq!(FieldValue::Text("5".into()).as_number(), Some(5.0));
        assert_eq!(FieldValue::Text(" 5.5 ".into()).as_number(), Some(5.5));
        assert_eq!(FieldValue::Text("abc".into()).as_number(), None);
        assert_eq!(FieldValue::Null.as_number(), None);
    }

    #[test]
    fn string_form_of_whole_numbers_has_no_fraction() {
        assert_eq!(FieldValue::Number(5.0).string_form(), "5");
        assert_eq!(FieldValue::Number(5.25).string_form(), "5.25");
        assert_eq!(FieldValue::Null.string_form(), "");
    }
}
