use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::ReconError;

pub const DEFAULT_CURRENCY_FIELD: &str = "currency";
pub const DEFAULT_TIMESTAMP_FIELD: &str = "timestamp";
pub const DEFAULT_ACCOUNT_FIELD: &str = "account";

// ---------------------------------------------------------------------------
// Ruleset
// ---------------------------------------------------------------------------

/// Declares which sources take part and which canonical fields identify,
/// value and describe a record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Ruleset {
    #[serde(default)]
    pub schema_version: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub key_fields: Vec<String>,
    #[serde(default)]
    pub amount_field: String,
    #[serde(default)]
    pub currency_field: String,
    #[serde(default)]
    pub timestamp_field: String,
    #[serde(default)]
    pub account_field: String,
}

impl Ruleset {
    pub fn from_json(input: &str) -> Result<Self, ReconError> {
        let ruleset: Ruleset = serde_json::from_str(input)
            .map_err(|e| ReconError::ConfigParse(format!("ruleset: {e}")))?;
        ruleset.validated()
    }

    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let ruleset: Ruleset = toml::from_str(input)
            .map_err(|e| ReconError::ConfigParse(format!("ruleset: {e}")))?;
        ruleset.validated()
    }

    /// Parse by file extension: `.toml` is TOML, everything else JSON.
    pub fn parse(input: &str, path: &Path) -> Result<Self, ReconError> {
        match extension_lower(path).as_deref() {
            Some("toml") => Self::from_toml(input),
            _ => Self::from_json(input),
        }
    }

    /// Check required fields and fill in field-name defaults.
    pub fn validated(mut self) -> Result<Self, ReconError> {
        if self.key_fields.is_empty() {
            return Err(ReconError::ConfigValidation(
                "ruleset key_fields must not be empty".into(),
            ));
        }
        if self.key_fields.iter().any(|f| f.trim().is_empty()) {
            return Err(ReconError::ConfigValidation(
                "ruleset key_fields must not contain empty names".into(),
            ));
        }
        if self.amount_field.is_empty() {
            return Err(ReconError::ConfigValidation(
                "ruleset amount_field is required".into(),
            ));
        }
        if self.currency_field.is_empty() {
            self.currency_field = DEFAULT_CURRENCY_FIELD.into();
        }
        if self.timestamp_field.is_empty() {
            self.timestamp_field = DEFAULT_TIMESTAMP_FIELD.into();
        }
        if self.account_field.is_empty() {
            self.account_field = DEFAULT_ACCOUNT_FIELD.into();
        }
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// Field mapping
// ---------------------------------------------------------------------------

/// Raw field names, per source, for each canonical logical field.
/// `None` or an empty name leaves that canonical field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct FieldMapping {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
}

impl FieldMapping {
    /// Mapping used for sources the mapping config does not mention.
    pub fn identity(ruleset: &Ruleset) -> Self {
        Self {
            id: Some("id".into()),
            amount: Some(ruleset.amount_field.clone()),
            currency: Some(ruleset.currency_field.clone()),
            timestamp: Some(ruleset.timestamp_field.clone()),
            account: Some(ruleset.account_field.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct MappingConfig {
    #[serde(default)]
    pub sources: BTreeMap<String, FieldMapping>,
}

impl MappingConfig {
    pub fn from_json(input: &str) -> Result<Self, ReconError> {
        serde_json::from_str(input).map_err(|e| ReconError::ConfigParse(format!("mapping config: {e}")))
    }

    pub fn for_source(&self, source: &str) -> Option<&FieldMapping> {
        self.sources.get(source)
    }
}

// ---------------------------------------------------------------------------
// Run options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    HalfUp,
    Bankers,
}

impl FromStr for RoundingMode {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "half_up" => Ok(Self::HalfUp),
            "bankers" => Ok(Self::Bankers),
            other => Err(ReconError::UnsupportedRounding(other.into())),
        }
    }
}

impl fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HalfUp => write!(f, "half_up"),
            Self::Bankers => write!(f, "bankers"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    Auto,
    Csv,
    Json,
}

impl InputFormat {
    /// Concrete format for a file: `.json` is JSON, everything else CSV.
    pub fn for_path(self, path: &Path) -> InputFormat {
        match self {
            Self::Auto => match extension_lower(path).as_deref() {
                Some("json") => Self::Json,
                _ => Self::Csv,
            },
            concrete => concrete,
        }
    }
}

impl FromStr for InputFormat {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(ReconError::UnsupportedFormat(other.into())),
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Csv => write!(f, "csv"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// `ci` pins the manifest timestamp so every emitted file is reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Local,
    Ci,
}

impl FromStr for ExecutionMode {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "ci" => Ok(Self::Ci),
            other => Err(ReconError::UnsupportedMode(other.into())),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Ci => write!(f, "ci"),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine input document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DeterminismConfig {
    #[serde(default)]
    pub sort_keys: Vec<String>,
    #[serde(default)]
    pub rounding: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

/// The engine input document as written by callers. String-typed options are
/// checked once by [`EngineInput::resolve`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineInput {
    #[serde(default)]
    pub input_files: Vec<PathBuf>,
    #[serde(default)]
    pub input_format: Option<String>,
    #[serde(default)]
    pub mapping_config_path: Option<PathBuf>,
    #[serde(default)]
    pub ruleset_path: PathBuf,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub rounding_mode: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub determinism: DeterminismConfig,
}

/// Validated, typed run options.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub input_format: InputFormat,
    pub rounding: RoundingMode,
    pub timezone: Tz,
    pub mode: ExecutionMode,
    pub default_currency: Option<String>,
    pub sort_keys: Vec<String>,
    pub statement_rounding: String,
    pub statement_timezone: String,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            input_format: InputFormat::Auto,
            rounding: RoundingMode::Bankers,
            timezone: Tz::UTC,
            mode: ExecutionMode::Local,
            default_currency: None,
            sort_keys: default_sort_keys(),
            statement_rounding: RoundingMode::Bankers.to_string(),
            statement_timezone: "UTC".into(),
        }
    }
}

impl RunSettings {
    /// Human-readable determinism statement embedded in the output document.
    pub fn deterministic_statement(&self) -> String {
        format!(
            "Outputs are deterministic for identical inputs when using sort keys {}, \
             rounding mode {}, and timezone {}. The engine surfaces discrepancies based on \
             the normalized inputs; evidence hashes cover emitted files.",
            self.sort_keys.join(", "),
            self.statement_rounding,
            self.statement_timezone,
        )
    }
}

fn default_sort_keys() -> Vec<String> {
    vec!["key".into(), "source".into()]
}

/// Treat `""` the same as an absent option.
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl EngineInput {
    pub fn from_json(input: &str) -> Result<Self, ReconError> {
        serde_json::from_str(input).map_err(|e| ReconError::ConfigParse(format!("engine input: {e}")))
    }

    /// Resolve relative paths against `base_dir` (the directory holding the
    /// input document).
    pub fn rebase(&mut self, base_dir: &Path) {
        let join = |p: &Path| -> PathBuf {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                base_dir.join(p)
            }
        };
        self.input_files = self.input_files.iter().map(|p| join(p)).collect();
        self.ruleset_path = join(&self.ruleset_path);
        self.mapping_config_path = self
            .mapping_config_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .map(join);
        self.output_dir = join(&self.output_dir);
    }

    /// Validate required fields, apply defaults and parse option strings.
    pub fn resolve(&self) -> Result<RunSettings, ReconError> {
        if self.input_files.is_empty() {
            return Err(ReconError::NoInputFiles);
        }
        if self.ruleset_path.as_os_str().is_empty() {
            return Err(ReconError::ConfigValidation("ruleset_path is required".into()));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(ReconError::ConfigValidation("output_dir is required".into()));
        }

        let rounding_str = non_empty(&self.rounding_mode).unwrap_or("bankers");
        let timezone_str = non_empty(&self.timezone).unwrap_or("UTC");
        let rounding: RoundingMode = rounding_str.parse()?;
        let input_format: InputFormat = non_empty(&self.input_format).unwrap_or("auto").parse()?;
        let mode: ExecutionMode = non_empty(&self.mode).unwrap_or("local").parse()?;
        let timezone: Tz = timezone_str
            .parse()
            .map_err(|_| ReconError::InvalidTimezone(timezone_str.into()))?;

        let sort_keys = if self.determinism.sort_keys.is_empty() {
            default_sort_keys()
        } else {
            self.determinism.sort_keys.clone()
        };

        Ok(RunSettings {
            input_format,
            rounding,
            timezone,
            mode,
            default_currency: non_empty(&self.currency).map(str::to_string),
            sort_keys,
            statement_rounding: non_empty(&self.determinism.rounding)
                .unwrap_or(rounding_str)
                .to_string(),
            statement_timezone: non_empty(&self.determinism.timezone)
                .unwrap_or(timezone_str)
                .to_string(),
        })
    }
}

/// Pair input files with source names. Declared sources are used positionally
/// when their count matches the file count; otherwise each file's stem names
/// its source.
pub fn resolve_sources(ruleset: &Ruleset, input_files: &[PathBuf]) -> Vec<String> {
    if ruleset.sources.len() == input_files.len() {
        return ruleset.sources.clone();
    }
    input_files
        .iter()
        .map(|path| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
        .collect()
}

fn extension_lower(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
