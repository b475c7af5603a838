use crate::amount::parse_minor_units;
use crate::config::{MappingConfig, Ruleset, RunSettings};
use crate::key::build_key;
use crate::mapper::{map_record, ACCOUNT_FIELD, ID_FIELD};
use crate::model::{NormalizationSummary, NormalizedRecord, SourceBatch};
use crate::timestamp::normalize_timestamp;
use crate::value::RawRecord;

/// Everything the per-record pipeline reads. Nothing here is mutated.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    pub ruleset: &'a Ruleset,
    pub mapping: &'a MappingConfig,
    pub settings: &'a RunSettings,
}

/// Map, key and normalize one raw record.
///
/// Returns `None` when the record has no complete key; the skip is counted in
/// `summary` with a bare `"missing key field <name>"` warning. Amount and
/// timestamp problems fall back (`0` / verbatim text) and add a
/// `"<source>: <warning>"` line.
pub fn normalize_record(
    raw: &RawRecord,
    source: &str,
    ctx: NormalizeContext<'_>,
    summary: &mut NormalizationSummary,
) -> Option<NormalizedRecord> {
    let ruleset = ctx.ruleset;
    let mapped = map_record(raw, source, ruleset, ctx.mapping);
    let field = |name: &str| mapped.get(name).cloned().unwrap_or_default();

    let key = match build_key(&mapped, &ruleset.key_fields) {
        Ok(key) => key,
        Err(issue) => {
            summary.warnings.push(issue.to_string());
            summary.records_skipped += 1;
            return None;
        }
    };

    let amount_text = field(&ruleset.amount_field);
    let amount_minor_units = parse_minor_units(&amount_text, ctx.settings.rounding)
        .unwrap_or_else(|issue| {
            summary.warnings.push(format!("{source}: {issue}"));
            0
        });

    let mut currency = field(&ruleset.currency_field);
    if currency.is_empty() {
        if let Some(default) = &ctx.settings.default_currency {
            currency = default.clone();
        }
    }

    let raw_timestamp = field(&ruleset.timestamp_field);
    let timestamp = normalize_timestamp(&raw_timestamp, ctx.settings.timezone).unwrap_or_else(|issue| {
        summary.warnings.push(format!("{source}: {issue}"));
        raw_timestamp.clone()
    });

    summary.records_processed += 1;
    Some(NormalizedRecord {
        source: source.to_string(),
        key,
        id: field(ID_FIELD),
        account: field(ACCOUNT_FIELD),
        amount_minor_units,
        currency,
        timestamp,
    })
}

/// Normalize every batch in order and return the records in output order.
pub fn normalize_batches(
    batches: &[SourceBatch],
    ctx: NormalizeContext<'_>,
) -> (Vec<NormalizedRecord>, NormalizationSummary) {
    let mut summary = NormalizationSummary::default();
    let mut records: Vec<NormalizedRecord> = batches
        .iter()
        .flat_map(|batch| batch.records.iter().map(move |raw| (batch.source.as_str(), raw)))
        .filter_map(|(source, raw)| normalize_record(raw, source, ctx, &mut summary))
        .collect();

    records.sort_by(NormalizedRecord::cmp_output_order);
    (records, summary)
}
