//! Loosely typed view over one remote record.
//!
//! The remote payload shape is not under our control: fields go missing, ids
//! arrive as numbers or strings, timestamps as epoch seconds or RFC 3339. Every
//! read goes through an accessor here that applies a default instead of failing.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};

/// Epoch values above this are taken to be milliseconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 100_000_000_000.0;

/// A single remote record as returned by the source API.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: Map<String, Value>,
}

impl RawRecord {
    /// Wrap a JSON value. Anything other than an object becomes an empty record.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(fields) => Self {
                fields: fields.clone(),
            },
            _ => Self::default(),
        }
    }

    /// Look up a field. Dotted paths (`"contact.id"`) descend into nested objects.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.fields.get(first)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        match current {
            Value::Null => None,
            other => Some(other),
        }
    }

    /// Non-empty string, or a number/bool rendered as text.
    pub fn text(&self, path: &str) -> Option<String> {
        match self.get(path)? {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Remote identifier. Numeric ids are rendered without a fractional part.
    pub fn id(&self, path: &str) -> Option<String> {
        match self.get(path)? {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(i.to_string()),
                None => Some(n.to_string()),
            },
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.trim().to_string()),
            _ => None,
        }
    }

    /// Identifier of a nested object, accepting both `{"contact": {"id": 7}}`
    /// and a bare `{"contact": 7}`.
    pub fn nested_id(&self, path: &str) -> Option<String> {
        match self.get(path)? {
            Value::Object(_) => self.id(&format!("{path}.id")),
            _ => self.id(path),
        }
    }

    pub fn int(&self, path: &str) -> Option<i64> {
        match self.get(path)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn float(&self, path: &str) -> Option<f64> {
        match self.get(path)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean with a `false` default. Accepts `1`/`0` and `"true"`/`"yes"`/`"1"`.
    pub fn flag(&self, path: &str) -> bool {
        match self.get(path) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "y"
            ),
            _ => false,
        }
    }

    /// Timestamp from epoch seconds or milliseconds, RFC 3339, `YYYY-MM-DD HH:MM:SS`
    /// (taken as UTC) or a bare date (midnight UTC).
    pub fn timestamp(&self, path: &str) -> Option<DateTime<Utc>> {
        match self.get(path)? {
            Value::Number(n) => from_epoch(n.as_f64()?),
            Value::String(s) => parse_timestamp(s.trim()),
            _ => None,
        }
    }

    /// JSON array with an empty-array default.
    pub fn json_array(&self, path: &str) -> Value {
        match self.get(path) {
            Some(Value::Array(items)) => Value::Array(items.clone()),
            _ => Value::Array(Vec::new()),
        }
    }
}

fn from_epoch(value: f64) -> Option<DateTime<Utc>> {
    if value <= 0.0 {
        return None;
    }
    let millis = if value > EPOCH_MILLIS_THRESHOLD {
        value
    } else {
        value * 1000.0
    };
    Utc.timestamp_millis_opt(millis as i64).single()
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(epoch) = s.parse::<f64>() {
        return from_epoch(epoch);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
