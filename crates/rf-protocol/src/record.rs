//! Decoded device records

use std::fmt;

use serde_json::{Map, Value};

/// A decoded frame that identifies a device
///
/// Only JSON objects with a truthy `id` field become `DeviceData`. A falsy
/// `id` is `null`, `false`, `0` or the empty string.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceData {
    id: String,
    fields: Map<String, Value>,
}

impl DeviceData {
    /// Name of the mandatory identity field
    pub const ID_FIELD: &'static str = "id";

    /// Validate a parser result
    ///
    /// Returns `None` for anything that is not an object or that lacks an
    /// identity.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(fields) = value else {
            return None;
        };
        let id = fields.get(Self::ID_FIELD).and_then(identity_of)?;
        Some(Self { id, fields })
    }

    /// Device identity as text
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Look up a protocol-specific field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// All decoded fields, including `id`
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Convert back into a JSON object
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl From<DeviceData> for Value {
    fn from(data: DeviceData) -> Self {
        data.into_value()
    }
}

impl fmt::Display for DeviceData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Map<String, Value> always serializes
        match serde_json::to_string(&self.fields) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{{\"id\":{:?}}}", self.id),
        }
    }
}

fn identity_of(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::Bool(true) => Some("true".to_string()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
