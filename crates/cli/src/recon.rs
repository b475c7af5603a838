//! `tally run` / `tally validate` — engine input loading and the run itself.

use std::path::{Path, PathBuf};

use tally_recon::config::resolve_sources;
use tally_recon::loader::parse_records;
use tally_recon::model::VarianceKind;
use tally_recon::{
    EngineInput, MappingConfig, ReconConfig, ReconError, ReconInput, Ruleset, SourceBatch,
};

use crate::exit_codes::{EXIT_ERROR, EXIT_RECON_RUNTIME, EXIT_RECON_VARIANCES};
use crate::CliError;

fn recon_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

/// Everything resolved from an engine input document, before any data file
/// is opened.
struct Prepared {
    config: ReconConfig,
    input_files: Vec<PathBuf>,
    sources: Vec<String>,
    output_dir: PathBuf,
}

fn read_text(path: &Path) -> Result<String, ReconError> {
    std::fs::read_to_string(path).map_err(|e| ReconError::io(path, e))
}

/// Load the engine input, resolve relative paths against its directory, and
/// load the ruleset and mapping config it points at.
fn prepare(input_path: &Path) -> Result<Prepared, CliError> {
    let text = read_text(input_path).map_err(|e| {
        CliError::from(e).with_hint("pass the path of an engine input JSON document")
    })?;
    let mut engine_input = EngineInput::from_json(&text)?;
    let base_dir = input_path.parent().unwrap_or_else(|| Path::new("."));
    engine_input.rebase(base_dir);

    let settings = engine_input.resolve()?;

    let ruleset_text = read_text(&engine_input.ruleset_path)?;
    let ruleset = Ruleset::parse(&ruleset_text, &engine_input.ruleset_path)?;

    let mapping = match &engine_input.mapping_config_path {
        Some(path) => MappingConfig::from_json(&read_text(path)?)?,
        None => MappingConfig::default(),
    };

    let sources = resolve_sources(&ruleset, &engine_input.input_files);
    if sources.iter().all(|s| s.is_empty()) {
        return Err(CliError::from(ReconError::NoSources)
            .with_hint("declare `sources` in the ruleset or give input files a name"));
    }

    tracing::info!(
        input = %input_path.display(),
        files = engine_input.input_files.len(),
        sources = %sources.join(","),
        "engine input resolved"
    );

    Ok(Prepared {
        config: ReconConfig { ruleset, mapping, settings },
        input_files: engine_input.input_files,
        sources,
        output_dir: engine_input.output_dir,
    })
}

/// Read and parse every input file into a batch tagged with its source.
fn load_batches(prepared: &Prepared) -> Result<ReconInput, CliError> {
    let format = prepared.config.settings.input_format;
    let mut batches = Vec::with_capacity(prepared.input_files.len());
    for (path, source) in prepared.input_files.iter().zip(&prepared.sources) {
        let text = read_text(path)?;
        let records = parse_records(&text, format, path)?;
        tracing::info!(source = %source, path = %path.display(), records = records.len(), "loaded input");
        batches.push(SourceBatch {
            source: source.clone(),
            format: format.for_path(path).to_string(),
            records,
        });
    }
    Ok(ReconInput { batches })
}

pub fn cmd_run(input_path: PathBuf, json_output: bool, fail_on_variance: bool) -> Result<(), CliError> {
    let prepared = prepare(&input_path)?;
    let input = load_batches(&prepared)?;

    let output = tally_recon::run_to_dir(&prepared.config, &input, &prepared.output_dir)
        .map_err(|e| match e {
            ReconError::Io { .. } => CliError::from(e)
                .with_hint("check that output_dir is writable"),
            other => CliError::from(other),
        })?;

    if json_output {
        let json_str = serde_json::to_string_pretty(&output)
            .map_err(|e| recon_err(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    }

    // Human summary to stderr
    let n = &output.normalization_summary;
    let v = &output.variance_summary;
    eprintln!(
        "{} sources: {} records normalized, {} skipped, {} warnings",
        prepared.sources.len(),
        n.records_processed,
        n.records_skipped,
        n.warnings.len(),
    );
    eprintln!(
        "variances: {} ({} amount mismatches, {} missing records)",
        v.total,
        v.count(VarianceKind::AmountMismatch),
        v.count(VarianceKind::MissingRecord),
    );
    eprintln!("wrote evidence to {}", prepared.output_dir.display());

    if fail_on_variance && v.total > 0 {
        return Err(recon_err(EXIT_RECON_VARIANCES, format!("{} variances found", v.total)));
    }

    Ok(())
}

pub fn cmd_validate(input_path: PathBuf) -> Result<(), CliError> {
    let prepared = prepare(&input_path)?;
    let settings = &prepared.config.settings;

    eprintln!(
        "valid: {} input file(s), sources: {}",
        prepared.input_files.len(),
        prepared.sources.join(", "),
    );
    eprintln!(
        "key fields: {}; rounding {}, timezone {}, mode {}",
        prepared.config.ruleset.key_fields.join(", "),
        settings.rounding,
        settings.timezone,
        settings.mode,
    );
    eprintln!("output: {}", prepared.output_dir.display());

    let missing: Vec<_> = prepared.input_files.iter().filter(|p| !p.is_file()).collect();
    if let Some(first) = missing.first() {
        return Err(recon_err(
            EXIT_RECON_RUNTIME,
            format!("{} input file(s) not found, first: {}", missing.len(), first.display()),
        ));
    }

    Ok(())
}
