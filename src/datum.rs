//! Output values produced by one evaluation step.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// One output of the evaluation graph.
///
/// `Datum` is the type-agnostic value a node yields per `next()`. Composite
/// nodes snapshot their children into `List` and `Map`; transformers read
/// their arguments' data and produce `Text`.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    /// Null value
    Null,

    /// Boolean value
    Bool(bool),

    /// 64-bit signed integer
    Long(i64),

    /// 64-bit floating point
    Double(f64),

    /// String value
    Text(String),

    /// UUID value
    Uuid(Uuid),

    /// Calendar date without time of day
    Date(NaiveDate),

    /// Date/time with timezone
    DateTime(DateTime<Utc>),

    /// Date/time without timezone
    LocalDateTime(NaiveDateTime),

    /// List of values
    List(Vec<Datum>),

    /// Map of named values
    Map(BTreeMap<String, Datum>),
}

impl Datum {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Try to get this value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get this value as an i64.
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get this value as an f64.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(f) => Some(*f),
            Self::Long(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a list.
    pub fn as_list(&self) -> Option<&[Datum]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Convert to a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::{json, Value as Json};
        match self {
            Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Long(i) => json!(i),
            Self::Double(f) => json!(f),
            Self::Text(s) => Json::String(s.clone()),
            Self::Uuid(u) => Json::String(u.to_string()),
            Self::Date(d) => Json::String(d.format("%Y-%m-%d").to_string()),
            Self::DateTime(dt) => Json::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Self::LocalDateTime(dt) => {
                Json::String(dt.format("%Y-%m-%dT%H:%M:%S%.3f").to_string())
            }
            Self::List(items) => Json::Array(items.iter().map(Datum::to_json).collect()),
            Self::Map(fields) => Json::Object(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Long(i) => write!(f, "{i}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Uuid(u) => write!(f, "{u}"),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::DateTime(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Self::LocalDateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.3f")),
            Self::List(_) | Self::Map(_) => write!(f, "{}", self.to_json()),
        }
    }
}
