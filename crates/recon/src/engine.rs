use std::path::Path;

use crate::config::{MappingConfig, Ruleset, RunSettings};
use crate::error::ReconError;
use crate::evidence::write_bundle;
use crate::model::{
    EngineOutput, NormalizationSummary, NormalizedRecord, SourceBatch, VarianceItem, VarianceKind,
    VarianceSummary,
};
use crate::normalize::{normalize_batches, NormalizeContext};
use crate::runlog::RunLog;
use crate::variance::detect_variances;

/// Parsed configuration for one run.
#[derive(Debug, Clone)]
pub struct ReconConfig {
    pub ruleset: Ruleset,
    pub mapping: MappingConfig,
    pub settings: RunSettings,
}

/// Pre-loaded raw records, one batch per input file, in input-file order.
#[derive(Debug, Clone, Default)]
pub struct ReconInput {
    pub batches: Vec<SourceBatch>,
}

/// Everything a run produces before anything is written.
#[derive(Debug, Clone)]
pub struct ReconOutcome {
    /// Source names in input-file order; the variance detector's declared set.
    pub sources: Vec<String>,
    /// Sorted by (key, source, amount, id).
    pub records: Vec<NormalizedRecord>,
    pub normalization: NormalizationSummary,
    /// Sorted by (key, type).
    pub variances: Vec<VarianceItem>,
    pub variance_summary: VarianceSummary,
    pub log: RunLog,
}

/// Run the pipeline: map, key and normalize every record, then classify
/// every key across the sources.
pub fn run(config: &ReconConfig, input: &ReconInput) -> Result<ReconOutcome, ReconError> {
    let sources: Vec<String> = input
        .batches
        .iter()
        .map(|b| b.source.clone())
        .filter(|s| !s.is_empty())
        .collect();
    if sources.is_empty() {
        return Err(ReconError::NoSources);
    }

    let settings = &config.settings;
    let mut log = RunLog::new();
    log.line(format!("tally-recon {} run started", env!("CARGO_PKG_VERSION")));
    log.line(format!(
        "settings: rounding={} timezone={} mode={} key_fields={}",
        settings.rounding,
        settings.timezone,
        settings.mode,
        config.ruleset.key_fields.join(",")
    ));
    for batch in &input.batches {
        log.line(format!(
            "source {}: {} records ({})",
            batch.source,
            batch.records.len(),
            batch.format
        ));
    }

    let ctx = NormalizeContext {
        ruleset: &config.ruleset,
        mapping: &config.mapping,
        settings,
    };
    let (records, normalization) = normalize_batches(&input.batches, ctx);
    log.line(format!(
        "normalized: processed={} skipped={} warnings={}",
        normalization.records_processed,
        normalization.records_skipped,
        normalization.warnings.len()
    ));
    for warning in &normalization.warnings {
        tracing::debug!("{warning}");
    }

    let variances = detect_variances(&records, &sources);
    let variance_summary = VarianceSummary::from_items(&variances);
    log.line(format!(
        "variances: total={} amount_mismatch={} missing_record={}",
        variance_summary.total,
        variance_summary.count(VarianceKind::AmountMismatch),
        variance_summary.count(VarianceKind::MissingRecord)
    ));

    Ok(ReconOutcome {
        sources,
        records,
        normalization,
        variances,
        variance_summary,
        log,
    })
}

/// [`run`], then write the evidence bundle below `output_dir`.
pub fn run_to_dir(
    config: &ReconConfig,
    input: &ReconInput,
    output_dir: &Path,
) -> Result<EngineOutput, ReconError> {
    let outcome = run(config, input)?;
    write_bundle(output_dir, &outcome, &config.settings)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
