use std::collections::BTreeMap;

use crate::model::{NormalizedRecord, SourceAmount, VarianceItem, VarianceKind};

/// Per-key accumulation across sources.
#[derive(Debug, Default)]
struct KeyTally<'a> {
    amounts: BTreeMap<&'a str, i64>,
    currency: Option<&'a str>,
}

/// Classify every key across the declared sources.
///
/// Amounts for the same (key, source) are summed. A key missing from any
/// declared source yields `missing_record`; otherwise differing sums yield
/// `amount_mismatch`; fully agreeing keys yield nothing. The currency is the
/// first non-empty one seen for the key in `records` order. Output is sorted
/// by (key, type).
pub fn detect_variances(records: &[NormalizedRecord], sources: &[String]) -> Vec<VarianceItem> {
    let mut by_key: BTreeMap<&str, KeyTally<'_>> = BTreeMap::new();
    for record in records {
        let tally = by_key.entry(record.key.as_str()).or_default();
        let sum = tally.amounts.entry(record.source.as_str()).or_insert(0);
        *sum = sum.saturating_add(record.amount_minor_units);
        if tally.currency.is_none() && !record.currency.is_empty() {
            tally.currency = Some(record.currency.as_str());
        }
    }

    let mut declared: Vec<&str> = Vec::with_capacity(sources.len());
    for source in sources {
        if !declared.contains(&source.as_str()) {
            declared.push(source);
        }
    }

    let mut items = Vec::new();
    for (key, tally) in &by_key {
        let mut amounts_by_source = Vec::with_capacity(declared.len());
        let mut missing_sources = Vec::new();
        for source in &declared {
            match tally.amounts.get(source) {
                Some(amount) => amounts_by_source.push(SourceAmount {
                    source: source.to_string(),
                    amount_minor_units: *amount,
                }),
                None => missing_sources.push(source.to_string()),
            }
        }
        missing_sources.sort();

        let kind = if !missing_sources.is_empty() {
            VarianceKind::MissingRecord
        } else if amounts_by_source
            .windows(2)
            .any(|w| w[0].amount_minor_units != w[1].amount_minor_units)
        {
            VarianceKind::AmountMismatch
        } else {
            continue;
        };

        tracing::debug!(key = %key, kind = %kind, "variance");
        items.push(VarianceItem {
            key: key.to_string(),
            kind,
            currency: tally.currency.unwrap_or_default().to_string(),
            amounts_by_source,
            missing_sources,
        });
    }

    items.sort_by(|a, b| (&a.key, a.kind.as_str()).cmp(&(&b.key, b.kind.as_str())));
    items
}
