//! Conversions between JSON input and SeaQuery values.

use sea_query::Value;
use uuid::Uuid;

/// Convert a JSON value into a bindable SQL value.
///
/// Scalars map to their natural SQL types; arrays and objects are bound
/// as JSON.
pub fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::String(None),
        serde_json::Value::Bool(b) => Value::from(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::from(i),
            None => Value::from(n.as_f64().unwrap_or_default()),
        },
        serde_json::Value::String(s) => Value::from(s.clone()),
        other => Value::Json(Some(Box::new(other.clone()))),
    }
}

/// Parse a key given as text (CLI arguments, path segments).
///
/// UUIDs and integers are recognised; anything else stays a string.
pub fn parse_key(raw: &str) -> Value {
    if let Ok(id) = Uuid::parse_str(raw) {
        return Value::from(id);
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    Value::from(raw.to_string())
}
