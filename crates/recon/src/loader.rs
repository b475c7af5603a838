use std::path::Path;

use serde_json::Value;

use crate::config::InputFormat;
use crate::error::ReconError;
use crate::value::{stringify_object, RawRecord};

/// Parse the text of one input file into raw records. `Auto` is resolved from
/// the path's extension.
pub fn parse_records(
    text: &str,
    format: InputFormat,
    path: &Path,
) -> Result<Vec<RawRecord>, ReconError> {
    match format.for_path(path) {
        InputFormat::Json => parse_json_records(text, path),
        _ => parse_csv_records(text, path),
    }
}

/// Header row names the fields; header names and cells are trimmed. A row
/// whose field count differs from the header's fails the whole file.
pub fn parse_csv_records(text: &str, path: &Path) -> Result<Vec<RawRecord>, ReconError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ReconError::input_parse(path, format!("read csv: {e}")))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| ReconError::input_parse(path, format!("read csv: {e}")))?;
        let record: RawRecord = headers
            .iter()
            .zip(row.iter())
            .map(|(h, v)| (h.clone(), v.to_string()))
            .collect();
        records.push(record);
    }

    Ok(records)
}

/// Accepts a top-level array of objects, or an object holding a `records`
/// array. Non-object array items are ignored.
pub fn parse_json_records(text: &str, path: &Path) -> Result<Vec<RawRecord>, ReconError> {
    let raw: Value = serde_json::from_str(text)
        .map_err(|e| ReconError::input_parse(path, format!("parse json: {e}")))?;

    let items = match raw {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("records") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => return Err(ReconError::input_parse(path, "unsupported json structure")),
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(object) => Some(stringify_object(object)),
            _ => None,
        })
        .collect())
}
