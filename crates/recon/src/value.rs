use std::collections::BTreeMap;

use serde_json::{Map, Number, Value};

/// A raw record after stringification: raw field name → text value.
pub type RawRecord = BTreeMap<String, String>;

/// A scalar (or nested) value as it appeared in a source file.
///
/// CSV cells are always `Text`; JSON values keep their type until
/// [`RawValue::stringify`] renders them.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Number(Number),
    Bool(bool),
    Null,
    /// Arrays and objects, kept as compact JSON text.
    Nested(String),
}

impl RawValue {
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(s) => Self::Text(s),
            Value::Number(n) => Self::Number(n),
            Value::Bool(b) => Self::Bool(b),
            Value::Null => Self::Null,
            nested @ (Value::Array(_) | Value::Object(_)) => Self::Nested(nested.to_string()),
        }
    }

    /// Total rendering to text. Numbers use their shortest round-trip decimal
    /// form with no exponent, `null` becomes the empty string.
    pub fn stringify(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => render_number(n),
            Self::Bool(b) => b.to_string(),
            Self::Null => String::new(),
            Self::Nested(raw) => raw.clone(),
        }
    }
}

fn render_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    // f64 Display is shortest round-trip and never switches to exponent form.
    n.as_f64().map(|f| f.to_string()).unwrap_or_else(|| n.to_string())
}

/// Stringify every value of a JSON object.
pub fn stringify_object(object: Map<String, Value>) -> RawRecord {
    object
        .into_iter()
        .map(|(k, v)| (k, RawValue::from_json(v).stringify()))
        .collect()
}
