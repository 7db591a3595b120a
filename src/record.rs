use serde_json::Value;

/// A single row returned by the backend. The field set is whatever the server
/// sent for that page; `serde_json`'s `preserve_order` feature keeps fields in
/// response order so columns render the way the backend emitted them.
pub type Record = serde_json::Map<String, Value>;

/// String form of a field value for display and matching. Null and missing
/// values become the empty string.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// String form of a named field, empty when the field is absent.
pub fn field_text(record: &Record, field: &str) -> String {
    record.get(field).map(value_text).unwrap_or_default()
}

/// Numeric form of a value, if it is a JSON number.
pub fn value_number(value: &Value) -> Option<f64> {
    value.as_f64()
}

/// Numeric form of a named field.
pub fn field_number(record: &Record, field: &str) -> Option<f64> {
    record.get(field).and_then(value_number)
}

/// Column names discovered from the first record. Pages are assumed
/// homogeneous, so the first record defines the full field set.
pub fn columns(records: &[Record]) -> Vec<String> {
    records
        .first()
        .map(|r| r.keys().cloned().collect())
        .unwrap_or_default()
}
