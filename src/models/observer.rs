//! Observer entities: the policy unit of the engine.
//!
//! An observer watches one column of one monitored table and fires
//! notifications when a condition holds. Conditions are grouped into
//! families sharing an input shape (numeric threshold, string value, date
//! parameters); in memory the family is a tagged union so a condition can
//! never carry the wrong kind of operand.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{ConnectionCredentials, MonitoredTable};

/// The closed set of condition types an observer may be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    /// Numeric: value < threshold.
    LessThan,
    /// Numeric: value > threshold.
    GreaterThan,
    /// Numeric or string equality.
    Equals,
    /// Negated equality.
    NotEquals,
    /// String containment.
    Contains,
    /// String prefix.
    StartsWith,
    /// String suffix.
    EndsWith,
    /// Date within the upcoming alert window.
    DateNearExpiry,
    /// Date strictly in the past (gated on `alert_on_expired`).
    DateExpired,
    /// Date strictly in the future.
    DateFuture,
    /// Date strictly in the past.
    DatePast,
}

impl ConditionType {
    /// Parses the stored string form; `None` for anything outside the
    /// closed enum.
    pub fn parse(s: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(s.to_string())).ok()
    }

    /// The stored string form (`less_than`, `date_near_expiry`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionType::LessThan => "less_than",
            ConditionType::GreaterThan => "greater_than",
            ConditionType::Equals => "equals",
            ConditionType::NotEquals => "not_equals",
            ConditionType::Contains => "contains",
            ConditionType::StartsWith => "starts_with",
            ConditionType::EndsWith => "ends_with",
            ConditionType::DateNearExpiry => "date_near_expiry",
            ConditionType::DateExpired => "date_expired",
            ConditionType::DateFuture => "date_future",
            ConditionType::DatePast => "date_past",
        }
    }
}

/// Numeric comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericOp {
    /// `value < threshold`
    LessThan,
    /// `value > threshold`
    GreaterThan,
}

/// String test operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOp {
    /// Substring containment.
    Contains,
    /// Prefix test.
    StartsWith,
    /// Suffix test.
    EndsWith,
}

/// Date condition operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOp {
    /// Within `[now, now + days_before_alert]`, inclusive on both ends.
    NearExpiry,
    /// Strictly past, gated on `alert_on_expired`.
    Expired,
    /// Strictly after now.
    Future,
    /// Strictly before now.
    Past,
}

/// How the watched column's dates should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFieldType {
    /// Calendar dates; comparisons are date-granular.
    #[default]
    Date,
    /// Timestamps; comparisons are instant-granular.
    DateTime,
}

impl DateFieldType {
    /// Parses the stored string form, defaulting to `Date`.
    pub fn parse(s: &str) -> Self {
        match s {
            "datetime" => DateFieldType::DateTime,
            _ => DateFieldType::Date,
        }
    }

    /// The stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            DateFieldType::Date => "date",
            DateFieldType::DateTime => "datetime",
        }
    }
}

/// Parameters for the date condition family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateParams {
    /// Granularity of the watched column.
    pub field_type: DateFieldType,
    /// Width of the near-expiry alert window, in days.
    pub days_before_alert: u32,
    /// How many days past expiry the `expired` condition keeps firing.
    /// Zero means unbounded.
    pub days_after_alert: u32,
    /// Whether expired dates alert at all.
    pub alert_on_expired: bool,
    /// Custom chrono format string; defaults per `field_type` when absent.
    pub format: Option<String>,
}

impl Default for DateParams {
    fn default() -> Self {
        Self {
            field_type: DateFieldType::Date,
            days_before_alert: 7,
            days_after_alert: 0,
            alert_on_expired: true,
            format: None,
        }
    }
}

/// The expected operand of an equality condition.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpectedValue {
    /// Compare numerically (configured via `threshold_value`).
    Number(f64),
    /// Compare string forms (configured via `string_value`).
    Text(String),
}

/// A validated condition, tagged by family.
///
/// The XOR invariant between `threshold_value` and `string_value` is encoded
/// in the type: a numeric condition cannot exist without its threshold, a
/// text condition cannot exist without its needle.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionSpec {
    /// `less_than` / `greater_than` against a numeric threshold.
    Numeric {
        /// The comparison operator.
        op: NumericOp,
        /// The threshold to compare against.
        threshold: f64,
    },
    /// `equals` / `not_equals`, numeric or textual depending on `expected`.
    Equality {
        /// True for `not_equals`.
        negated: bool,
        /// The configured operand.
        expected: ExpectedValue,
    },
    /// `contains` / `starts_with` / `ends_with`.
    Text {
        /// The string test operator.
        op: TextOp,
        /// The needle the value's string form is tested against.
        needle: String,
    },
    /// The date condition family.
    Date {
        /// The date operator.
        op: DateOp,
        /// Date-specific parameters.
        params: DateParams,
    },
    /// A stored condition this build does not understand. Always evaluates
    /// false; the validator prevents new ones from being created.
    Unsupported {
        /// The raw stored condition type.
        condition_type: String,
    },
}

impl ConditionSpec {
    /// Reassembles a condition from its persisted column values.
    ///
    /// Rows written out-of-band may be incoherent (unknown type, missing
    /// operand); those decode to [`ConditionSpec::Unsupported`] rather than
    /// failing the whole load.
    #[allow(clippy::too_many_arguments)]
    pub fn from_columns(
        condition_type: &str,
        threshold_value: Option<f64>,
        string_value: Option<String>,
        date_field_type: Option<String>,
        days_before_alert: Option<u32>,
        days_after_alert: Option<u32>,
        alert_on_expired: Option<bool>,
        date_format: Option<String>,
    ) -> Self {
        let unsupported = || ConditionSpec::Unsupported {
            condition_type: condition_type.to_string(),
        };
        let date_params = || DateParams {
            field_type: date_field_type
                .as_deref()
                .map(DateFieldType::parse)
                .unwrap_or_default(),
            days_before_alert: days_before_alert.unwrap_or(7),
            days_after_alert: days_after_alert.unwrap_or(0),
            alert_on_expired: alert_on_expired.unwrap_or(true),
            format: date_format.clone(),
        };

        let Some(kind) = ConditionType::parse(condition_type) else {
            return unsupported();
        };
        match kind {
            ConditionType::LessThan | ConditionType::GreaterThan => {
                let op = if kind == ConditionType::LessThan {
                    NumericOp::LessThan
                } else {
                    NumericOp::GreaterThan
                };
                match threshold_value {
                    Some(threshold) => ConditionSpec::Numeric { op, threshold },
                    None => unsupported(),
                }
            }
            ConditionType::Equals | ConditionType::NotEquals => {
                let negated = kind == ConditionType::NotEquals;
                if let Some(threshold) = threshold_value {
                    ConditionSpec::Equality {
                        negated,
                        expected: ExpectedValue::Number(threshold),
                    }
                } else if let Some(s) = string_value {
                    ConditionSpec::Equality {
                        negated,
                        expected: ExpectedValue::Text(s),
                    }
                } else {
                    unsupported()
                }
            }
            ConditionType::Contains | ConditionType::StartsWith | ConditionType::EndsWith => {
                let op = match kind {
                    ConditionType::Contains => TextOp::Contains,
                    ConditionType::StartsWith => TextOp::StartsWith,
                    _ => TextOp::EndsWith,
                };
                match string_value {
                    Some(needle) => ConditionSpec::Text { op, needle },
                    None => unsupported(),
                }
            }
            ConditionType::DateNearExpiry => ConditionSpec::Date {
                op: DateOp::NearExpiry,
                params: date_params(),
            },
            ConditionType::DateExpired => ConditionSpec::Date {
                op: DateOp::Expired,
                params: date_params(),
            },
            ConditionType::DateFuture => ConditionSpec::Date {
                op: DateOp::Future,
                params: date_params(),
            },
            ConditionType::DatePast => ConditionSpec::Date {
                op: DateOp::Past,
                params: date_params(),
            },
        }
    }

    /// The persisted condition type string for this spec.
    pub fn condition_type(&self) -> String {
        match self {
            ConditionSpec::Numeric { op, .. } => match op {
                NumericOp::LessThan => "less_than".into(),
                NumericOp::GreaterThan => "greater_than".into(),
            },
            ConditionSpec::Equality { negated, .. } => {
                if *negated {
                    "not_equals".into()
                } else {
                    "equals".into()
                }
            }
            ConditionSpec::Text { op, .. } => match op {
                TextOp::Contains => "contains".into(),
                TextOp::StartsWith => "starts_with".into(),
                TextOp::EndsWith => "ends_with".into(),
            },
            ConditionSpec::Date { op, .. } => match op {
                DateOp::NearExpiry => "date_near_expiry".into(),
                DateOp::Expired => "date_expired".into(),
                DateOp::Future => "date_future".into(),
                DateOp::Past => "date_past".into(),
            },
            ConditionSpec::Unsupported { condition_type } => condition_type.clone(),
        }
    }

    /// The persisted numeric threshold, if this family carries one.
    pub fn threshold_value(&self) -> Option<f64> {
        match self {
            ConditionSpec::Numeric { threshold, .. } => Some(*threshold),
            ConditionSpec::Equality {
                expected: ExpectedValue::Number(n),
                ..
            } => Some(*n),
            _ => None,
        }
    }

    /// The persisted string operand, if this family carries one.
    pub fn string_value(&self) -> Option<&str> {
        match self {
            ConditionSpec::Text { needle, .. } => Some(needle),
            ConditionSpec::Equality {
                expected: ExpectedValue::Text(s),
                ..
            } => Some(s),
            _ => None,
        }
    }

    /// The date parameters, if this is a date condition.
    pub fn date_params(&self) -> Option<&DateParams> {
        match self {
            ConditionSpec::Date { params, .. } => Some(params),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConditionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionSpec::Numeric { op, threshold } => {
                let sym = match op {
                    NumericOp::LessThan => "<",
                    NumericOp::GreaterThan => ">",
                };
                write!(f, "value {sym} {threshold}")
            }
            ConditionSpec::Equality { negated, expected } => {
                let sym = if *negated { "!=" } else { "==" };
                match expected {
                    ExpectedValue::Number(n) => write!(f, "value {sym} {n}"),
                    ExpectedValue::Text(s) => write!(f, "value {sym} \"{s}\""),
                }
            }
            ConditionSpec::Text { op, needle } => {
                let verb = match op {
                    TextOp::Contains => "contains",
                    TextOp::StartsWith => "starts with",
                    TextOp::EndsWith => "ends with",
                };
                write!(f, "value {verb} \"{needle}\"")
            }
            ConditionSpec::Date { op, params } => match op {
                DateOp::NearExpiry => {
                    write!(f, "date within {} days of expiry", params.days_before_alert)
                }
                DateOp::Expired => write!(f, "date expired"),
                DateOp::Future => write!(f, "date in the future"),
                DateOp::Past => write!(f, "date in the past"),
            },
            ConditionSpec::Unsupported { condition_type } => {
                write!(f, "unsupported condition \"{condition_type}\"")
            }
        }
    }
}

/// Notification destinations configured on an observer.
///
/// At least one channel must be configured; the validator enforces this
/// before persistence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationChannels {
    /// Recipient email addresses.
    #[serde(default)]
    pub emails: Vec<String>,
    /// Telegram chat ids to message.
    #[serde(default)]
    pub telegram_chat_ids: Vec<String>,
    /// Bot token used for all Telegram sends.
    #[serde(default)]
    pub telegram_bot_token: Option<String>,
}

impl NotificationChannels {
    /// True when the Telegram channel is fully configured (chat ids and a
    /// non-empty token).
    pub fn telegram_configured(&self) -> bool {
        !self.telegram_chat_ids.is_empty()
            && self
                .telegram_bot_token
                .as_deref()
                .is_some_and(|t| !t.is_empty())
    }

    /// True when the email channel has at least one recipient.
    pub fn email_configured(&self) -> bool {
        !self.emails.is_empty()
    }

    /// True when at least one channel can deliver.
    pub fn has_any(&self) -> bool {
        self.email_configured() || self.telegram_configured()
    }
}

/// A configured watch rule over one column of one monitored table.
#[derive(Debug, Clone, PartialEq)]
pub struct Observer {
    /// Unique identifier (auto-assigned on insert).
    pub id: i64,
    /// Owning monitored table id.
    pub monitored_table_id: i64,
    /// Display name, available to message templates.
    pub name: String,
    /// Column name to watch; resolved at runtime against scanned rows.
    pub field_to_watch: String,
    /// The condition to evaluate per row.
    pub condition: ConditionSpec,
    /// Inactive observers are never evaluated.
    pub is_active: bool,
    /// Minutes between checks (1–1440).
    pub check_interval_minutes: i64,
    /// Where to deliver notifications.
    pub channels: NotificationChannels,
    /// Subject template with `{placeholder}` substitution.
    pub notification_subject: String,
    /// Body template with `{placeholder}` substitution.
    pub notification_message: String,
    /// When this observer last completed a scheduled check.
    pub last_checked_at: Option<DateTime<Utc>>,
    /// When a scheduled check last found at least one matching row.
    pub last_triggered_at: Option<DateTime<Utc>>,
    /// Running total of rows that have met the condition.
    pub trigger_count: i64,
}

impl Observer {
    /// Whether this observer is due for a scheduled check at `now`.
    ///
    /// Never-checked observers are always due. The boundary is inclusive:
    /// exactly `last_checked_at + interval` counts as due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_checked_at {
            None => true,
            Some(last) => now >= last + Duration::minutes(self.check_interval_minutes),
        }
    }
}

/// One observer joined with its table mapping and decrypted credentials,
/// ready to run.
#[derive(Debug, Clone)]
pub struct ObserverJob {
    /// The observer policy.
    pub observer: Observer,
    /// The table it targets.
    pub table: MonitoredTable,
    /// Credentials for the owning connection, password decrypted.
    pub credentials: ConnectionCredentials,
}
