use std::fmt;

use crate::value::RawRecord;

/// Why a record could not produce a matching key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyIssue {
    MissingField(String),
}

impl fmt::Display for KeyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing key field {field}"),
        }
    }
}

/// Build the canonical matching key: `field=value` pairs in `key_fields`
/// order, joined by `|`. Values are trimmed; the first empty one aborts.
pub fn build_key(record: &RawRecord, key_fields: &[String]) -> Result<String, KeyIssue> {
    let mut parts = Vec::with_capacity(key_fields.len());
    for field in key_fields {
        let value = record.get(field).map(|v| v.trim()).unwrap_or("");
        if value.is_empty() {
            return Err(KeyIssue::MissingField(field.clone()));
        }
        parts.push(format!("{field}={value}"));
    }
    Ok(parts.join("|"))
}
