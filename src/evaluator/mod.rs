//! Pure condition evaluation.
//!
//! `evaluate` is a decision function with no I/O: given a scanned cell
//! value, a condition and the current instant, it answers whether the
//! condition holds. Malformed inputs (non-numeric values against numeric
//! conditions, unparseable dates) evaluate to `false` rather than raising;
//! the validator keeps malformed conditions out at configuration time, so a
//! `false` here is a data problem in the observed table, not a bug.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

use crate::models::{
    ConditionSpec, DateFieldType, DateOp, DateParams, ExpectedValue, FieldValue, NumericOp, TextOp,
};

/// Evaluates `condition` against `value` at instant `now`.
pub fn evaluate(value: &FieldValue, condition: &ConditionSpec, now: DateTime<Utc>) -> bool {
    match condition {
        ConditionSpec::Numeric { op, threshold } => match value.as_number() {
            Some(n) => match op {
                NumericOp::LessThan => n < *threshold,
                NumericOp::GreaterThan => n > *threshold,
            },
            None => false,
        },
        ConditionSpec::Equality { negated, expected } => {
            let equal = match expected {
                ExpectedValue::Number(expected) => value.as_number() == Some(*expected),
                ExpectedValue::Text(expected) => {
                    !value.is_null() && value.string_form() == *expected
                }
            };
            equal != *negated
        }
        ConditionSpec::Text { op, needle } => {
            if value.is_null() {
                return false;
            }
            let haystack = value.string_form();
            match op {
                TextOp::Contains => haystack.contains(needle.as_str()),
                TextOp::StartsWith => haystack.starts_with(needle.as_str()),
                TextOp::EndsWith => haystack.ends_with(needle.as_str()),
            }
        }
        ConditionSpec::Date { op, params } => match parse_date(value, params) {
            Some(parsed) => evaluate_date(parsed, *op, params, now),
            None => false,
        },
        ConditionSpec::Unsupported { .. } => false,
    }
}

/// Parses the watched value as a date per the observer's date parameters.
///
/// Typed date cells are used as-is; textual cells are parsed with the
/// configured format, falling back to the conventional form for the field
/// type (`%Y-%m-%d` for dates, `%Y-%m-%d %H:%M:%S` for datetimes).
pub fn parse_date(value: &FieldValue, params: &DateParams) -> Option<NaiveDateTime> {
    match value {
        FieldValue::Date(d) => Some(*d),
        FieldValue::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if let Some(format) = params.format.as_deref() {
                return parse_with_format(s, format);
            }
            match params.field_type {
                DateFieldType::Date => parse_with_format(s, "%Y-%m-%d")
                    .or_else(|| parse_with_format(s, "%Y-%m-%d %H:%M:%S")),
                DateFieldType::DateTime => parse_with_format(s, "%Y-%m-%d %H:%M:%S")
                    .or_else(|| parse_with_format(s, "%Y-%m-%d")),
            }
        }
        _ => None,
    }
}

fn parse_with_format(s: &str, format: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
        return Some(dt);
    }
    NaiveDate::parse_from_str(s, format)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn evaluate_date(
    parsed: NaiveDateTime,
    op: DateOp,
    params: &DateParams,
    now: DateTime<Utc>,
) -> bool {
    let now = now.naive_utc();

    // Calendar-date fields compare at day granularity, so a value expiring
    // later today still counts as "not yet past".
    match params.field_type {
        DateFieldType::Date => {
            let value = parsed.date();
            let today = now.date();
            match op {
                DateOp::NearExpiry => {
                    let window_end = today + Duration::days(params.days_before_alert as i64);
                    value >= today && value <= window_end
                }
                DateOp::Expired => {
                    params.alert_on_expired
                        && value < today
                        && within_grace(today - value, params.days_after_alert)
                }
                DateOp::Future => value > today,
                DateOp::Past => value < today,
            }
        }
        DateFieldType::DateTime => match op {
            DateOp::NearExpiry => {
                let window_end = now + Duration::days(params.days_before_alert as i64);
                parsed >= now && parsed <= window_end
            }
            DateOp::Expired => {
                params.alert_on_expired
                    && parsed < now
                    && within_grace(now - parsed, params.days_after_alert)
            }
            DateOp::Future => parsed > now,
            DateOp::Past => parsed < now,
        },
    }
}

/// `days_after_alert` bounds how long an expired value keeps alerting;
/// zero means unbounded.
fn within_grace(elapsed: Duration, days_after_alert: u32) -> bool {
    days_after_alert == 0 || elapsed <= Duration::days(days_after_alert as i64)
}
