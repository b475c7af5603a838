use std::path::PathBuf;

use thiserror::Error;

/// Fatal engine errors. Any of these aborts the run.
///
/// Per-record problems (missing key field, bad amount, bad timestamp) are not
/// errors; they surface as warnings in the normalization summary.
#[derive(Debug, Error)]
pub enum ReconError {
    /// JSON / TOML parse or deserialization error in a config document.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (missing required field, empty key list, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    #[error("unsupported rounding_mode: {0}")]
    UnsupportedRounding(String),
    #[error("unsupported input_format: {0}")]
    UnsupportedFormat(String),
    #[error("unsupported mode: {0}")]
    UnsupportedMode(String),
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),
    #[error("input_files must not be empty")]
    NoInputFiles,
    #[error("ruleset must define at least one source")]
    NoSources,
    /// A raw input file could not be parsed as its declared format.
    #[error("cannot parse {}: {message}", path.display())]
    InputParse { path: PathBuf, message: String },
    /// IO error while reading inputs or writing evidence.
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ReconError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn input_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InputParse {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_names_the_path() {
        let err = ReconError::io(
            "out/evidence/normalized.jsonl",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("out/evidence/normalized.jsonl"), "{msg}");
        assert!(msg.contains("denied"), "{msg}");
    }

    #[test]
    fn input_parse_message() {
        let err = ReconError::input_parse("bank.json", "unsupported json structure");
        assert_eq!(err.to_string(), "cannot parse bank.json: unsupported json structure");
    }
}
