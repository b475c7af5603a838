//! Evidence bundle: deterministic JSONL artifacts, SHA-256 manifest, and
//! manifest verification.
//!
//! Layout below the output directory:
//!
//! ```text
//! engine_output.json
//! evidence/normalized.jsonl
//! evidence/variances.jsonl
//! evidence/logs/engine.log
//! evidence/manifest.json
//! ```
//!
//! The manifest covers the two JSONL files and the run log. It is written
//! only after all three are on disk and synced, and the digests are taken
//! from the files as read back, not from the in-memory buffers.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::{ExecutionMode, RunSettings};
use crate::engine::ReconOutcome;
use crate::error::ReconError;
use crate::model::{EngineOutput, EvidenceManifest, ManifestEntry};

pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const SCHEMA_VERSION: &str = "1.0.0";

pub const NORMALIZED_PATH: &str = "evidence/normalized.jsonl";
pub const VARIANCES_PATH: &str = "evidence/variances.jsonl";
pub const LOG_PATH: &str = "evidence/logs/engine.log";
pub const MANIFEST_PATH: &str = "evidence/manifest.json";
pub const OUTPUT_PATH: &str = "engine_output.json";

/// `generated_at` used in `ci` mode.
pub const PINNED_GENERATED_AT: &str = "1970-01-01T00:00:00Z";

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// One compact JSON object per line, `\n`-terminated, in slice order.
pub fn to_jsonl<T: Serialize>(items: &[T]) -> Result<Vec<u8>, ReconError> {
    let mut out = Vec::new();
    for item in items {
        serde_json::to_writer(&mut out, item)?;
        out.push(b'\n');
    }
    Ok(out)
}

/// Two-space indented JSON with a trailing newline.
pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>, ReconError> {
    let mut out = serde_json::to_vec_pretty(value)?;
    out.push(b'\n');
    Ok(out)
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// Lowercase hex SHA-256.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Stream a file through SHA-256. Returns (hex digest, byte length).
pub fn hash_file(path: &Path) -> Result<(String, u64), ReconError> {
    let mut file = File::open(path).map_err(|e| ReconError::io(path, e))?;
    let mut hasher = Sha256::new();
    let bytes = io::copy(&mut file, &mut hasher).map_err(|e| ReconError::io(path, e))?;
    Ok((format!("{:x}", hasher.finalize()), bytes))
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Absolute location of a `/`-separated relative artifact path.
pub fn artifact_path(output_dir: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .fold(output_dir.to_path_buf(), |acc, part| acc.join(part))
}

/// Write `bytes` and sync them to storage before returning. The handle is
/// closed on every path out of this function.
fn write_artifact(path: &Path, bytes: &[u8]) -> Result<(), ReconError> {
    let mut file = File::create(path).map_err(|e| ReconError::io(path, e))?;
    file.write_all(bytes).map_err(|e| ReconError::io(path, e))?;
    file.sync_all().map_err(|e| ReconError::io(path, e))?;
    Ok(())
}

fn generated_at(mode: ExecutionMode) -> String {
    match mode {
        ExecutionMode::Ci => PINNED_GENERATED_AT.to_string(),
        ExecutionMode::Local => {
            chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        }
    }
}

/// Hash the given artifacts (already on disk) into a manifest sorted by path.
pub fn build_manifest(
    output_dir: &Path,
    relative_paths: &[&str],
    generated_at: String,
) -> Result<EvidenceManifest, ReconError> {
    let mut files = Vec::with_capacity(relative_paths.len());
    for relative in relative_paths {
        let (sha256, bytes) = hash_file(&artifact_path(output_dir, relative))?;
        files.push(ManifestEntry {
            path: relative.to_string(),
            sha256,
            bytes,
        });
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(EvidenceManifest {
        generated_at,
        tool_version: TOOL_VERSION.to_string(),
        schema_version: SCHEMA_VERSION.to_string(),
        files,
    })
}

/// Write the whole evidence bundle for `outcome` below `output_dir` and
/// return the output document that was written to `engine_output.json`.
pub fn write_bundle(
    output_dir: &Path,
    outcome: &ReconOutcome,
    settings: &RunSettings,
) -> Result<EngineOutput, ReconError> {
    let logs_dir = artifact_path(output_dir, "evidence/logs");
    fs::create_dir_all(&logs_dir).map_err(|e| ReconError::io(&logs_dir, e))?;

    // A manifest left over from an earlier run must not describe new files.
    let manifest_path = artifact_path(output_dir, MANIFEST_PATH);
    match fs::remove_file(&manifest_path) {
        Ok(()) => tracing::debug!(path = %manifest_path.display(), "removed stale manifest"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(ReconError::io(&manifest_path, e)),
    }

    write_artifact(&artifact_path(output_dir, NORMALIZED_PATH), &to_jsonl(&outcome.records)?)?;
    write_artifact(&artifact_path(output_dir, VARIANCES_PATH), &to_jsonl(&outcome.variances)?)?;

    let mut log = outcome.log.clone();
    log.line(format!(
        "wrote {} normalized records, {} variance items",
        outcome.records.len(),
        outcome.variances.len()
    ));
    log.line("run completed");
    write_artifact(&artifact_path(output_dir, LOG_PATH), &log.to_bytes())?;

    let manifest = build_manifest(
        output_dir,
        &[NORMALIZED_PATH, VARIANCES_PATH, LOG_PATH],
        generated_at(settings.mode),
    )?;
    write_artifact(&manifest_path, &to_pretty_json(&manifest)?)?;

    let output = EngineOutput {
        schema_version: SCHEMA_VERSION.to_string(),
        tool_version: TOOL_VERSION.to_string(),
        normalization_summary: outcome.normalization.clone(),
        variance_summary: outcome.variance_summary.clone(),
        normalized_records_path: NORMALIZED_PATH.to_string(),
        variance_items_path: VARIANCES_PATH.to_string(),
        evidence_manifest: manifest,
        deterministic_statement: settings.deterministic_statement(),
    };
    write_artifact(&artifact_path(output_dir, OUTPUT_PATH), &to_pretty_json(&output)?)?;

    tracing::info!(dir = %output_dir.display(), "evidence bundle written");
    Ok(output)
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "problem", rename_all = "snake_case")]
pub enum ManifestProblem {
    Missing { path: String },
    /// Absolute, or escapes the output directory.
    UnsafePath { path: String },
    SizeMismatch { path: String, expected: u64, actual: u64 },
    DigestMismatch { path: String, expected: String, actual: String },
    Unsorted,
    /// `engine_output.json` embeds a different manifest.
    OutputDisagrees,
}

impl fmt::Display for ManifestProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { path } => write!(f, "{path}: missing"),
            Self::UnsafePath { path } => write!(f, "{path}: path outside output directory"),
            Self::SizeMismatch { path, expected, actual } => {
                write!(f, "{path}: expected {expected} bytes, found {actual}")
            }
            Self::DigestMismatch { path, expected, actual } => {
                write!(f, "{path}: sha256 {actual} does not match manifest {expected}")
            }
            Self::Unsorted => write!(f, "manifest entries are not sorted by path"),
            Self::OutputDisagrees => {
                write!(f, "{OUTPUT_PATH} embeds a manifest different from {MANIFEST_PATH}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestVerification {
    pub ok: bool,
    pub files_checked: usize,
    pub problems: Vec<ManifestProblem>,
}

fn is_safe_relative(path: &str) -> bool {
    let p = Path::new(path);
    !path.is_empty() && p.components().all(|c| matches!(c, Component::Normal(_)))
}

/// Re-hash every file the manifest lists and compare. A missing or
/// unparseable manifest is an error; everything else is a reported problem.
pub fn verify_manifest(output_dir: &Path) -> Result<ManifestVerification, ReconError> {
    let manifest_path = artifact_path(output_dir, MANIFEST_PATH);
    let text = fs::read_to_string(&manifest_path).map_err(|e| ReconError::io(&manifest_path, e))?;
    let manifest: EvidenceManifest = serde_json::from_str(&text)
        .map_err(|e| ReconError::input_parse(&manifest_path, e.to_string()))?;

    let mut problems = Vec::new();
    if manifest.files.windows(2).any(|w| w[0].path > w[1].path) {
        problems.push(ManifestProblem::Unsorted);
    }

    for entry in &manifest.files {
        if !is_safe_relative(&entry.path) {
            problems.push(ManifestProblem::UnsafePath { path: entry.path.clone() });
            continue;
        }
        let path = artifact_path(output_dir, &entry.path);
        if !path.is_file() {
            problems.push(ManifestProblem::Missing { path: entry.path.clone() });
            continue;
        }
        let (sha256, bytes) = hash_file(&path)?;
        if bytes != entry.bytes {
            problems.push(ManifestProblem::SizeMismatch {
                path: entry.path.clone(),
                expected: entry.bytes,
                actual: bytes,
            });
        } else if sha256 != entry.sha256 {
            problems.push(ManifestProblem::DigestMismatch {
                path: entry.path.clone(),
                expected: entry.sha256.clone(),
                actual: sha256,
            });
        }
    }

    let output_path = artifact_path(output_dir, OUTPUT_PATH);
    if let Ok(output_text) = fs::read_to_string(&output_path) {
        match serde_json::from_str::<EngineOutput>(&output_text) {
            Ok(output) if output.evidence_manifest == manifest => {}
            _ => problems.push(ManifestProblem::OutputDisagrees),
        }
    }

    tracing::debug!(files = manifest.files.len(), problems = problems.len(), "manifest verified");

    Ok(ManifestVerification {
        ok: problems.is_empty(),
        files_checked: manifest.files.len(),
        problems,
    })
}
