//! Mapped output ready for the persister.

use chrono::{DateTime, Utc};
use sea_orm::Value;

/// Column stamped on every mapped record.
pub const LAST_SYNCED_AT: &str = "last_synced_at";

/// One row for a target table: an ordered list of `(column, value)` pairs.
///
/// Missing optional fields are stored as typed NULLs, never omitted, so every
/// record of an entity carries the same columns in the same order.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalRecord {
    columns: Vec<(&'static str, Value)>,
}

impl LocalRecord {
    /// Start a record stamped with the sync time.
    pub fn new(synced_at: DateTime<Utc>) -> Self {
        Self {
            columns: vec![(LAST_SYNCED_AT, Value::from(synced_at))],
        }
    }

    pub fn text(mut self, column: &'static str, value: Option<String>) -> Self {
        self.columns.push((column, Value::from(value)));
        self
    }

    pub fn int(mut self, column: &'static str, value: Option<i64>) -> Self {
        self.columns.push((column, Value::from(value)));
        self
    }

    pub fn float(mut self, column: &'static str, value: Option<f64>) -> Self {
        self.columns.push((column, Value::from(value)));
        self
    }

    pub fn flag(mut self, column: &'static str, value: bool) -> Self {
        self.columns.push((column, Value::from(value)));
        self
    }

    pub fn timestamp(mut self, column: &'static str, value: Option<DateTime<Utc>>) -> Self {
        self.columns.push((column, Value::from(value)));
        self
    }

    pub fn json(mut self, column: &'static str, value: serde_json::Value) -> Self {
        self.columns.push((column, Value::from(value)));
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }

    /// Whether `column` is present and not NULL.
    pub fn has_value(&self, column: &str) -> bool {
        match self.get(column) {
            None => false,
            Some(value) => !is_null(value),
        }
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|(name, _)| *name).collect()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.columns.iter().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

fn is_null(value: &Value) -> bool {
    matches!(
        value,
        Value::String(None)
            | Value::BigInt(None)
            | Value::Double(None)
            | Value::Bool(None)
            | Value::ChronoDateTimeUtc(None)
            | Value::Json(None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn new_record_is_stamped_first() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap();
        let record = LocalRecord::new(now).text("pms_id", Some("1".to_string()));

        assert_eq!(record.column_names(), vec![LAST_SYNCED_AT, "pms_id"]);
        assert_eq!(record.get(LAST_SYNCED_AT), Some(&Value::from(now)));
    }

    #[test]
    fn missing_fields_are_typed_nulls() {
        let record = LocalRecord::new(Utc::now())
            .text("name", None)
            .float("price", None)
            .timestamp("modified_at", None);

        assert_eq!(record.len(), 4);
        assert!(!record.has_value("name"));
        assert!(!record.has_value("price"));
        assert!(!record.has_value("modified_at"));
        assert!(!record.has_value("not_a_column"));
        assert_eq!(record.get("name"), Some(&Value::String(None)));
    }

    #[test]
    fn present_values_are_reported() {
        let record = LocalRecord::new(Utc::now())
            .text("pms_id", Some("9".to_string()))
            .flag("is_active", false);

        assert!(record.has_value("pms_id"));
        assert!(record.has_value("is_active"));
    }
}
