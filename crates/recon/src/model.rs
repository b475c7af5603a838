use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::RawRecord;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Raw records from one input file, tagged with their source name.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub source: String,
    /// Concrete format the records were read as (for the run log).
    pub format: String,
    pub records: Vec<RawRecord>,
}

// ---------------------------------------------------------------------------
// Normalized records
// ---------------------------------------------------------------------------

/// One raw record in canonical form. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub source: String,
    pub key: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub account: String,
    pub amount_minor_units: i64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub timestamp: String,
}

impl NormalizedRecord {
    /// Total output order: key, source, amount, id.
    pub fn cmp_output_order(&self, other: &Self) -> std::cmp::Ordering {
        (&self.key, &self.source, self.amount_minor_units, &self.id).cmp(&(
            &other.key,
            &other.source,
            other.amount_minor_units,
            &other.id,
        ))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationSummary {
    pub records_processed: usize,
    pub records_skipped: usize,
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Variances
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceKind {
    MissingRecord,
    AmountMismatch,
}

impl VarianceKind {
    pub const ALL: [VarianceKind; 2] = [Self::AmountMismatch, Self::MissingRecord];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingRecord => "missing_record",
            Self::AmountMismatch => "amount_mismatch",
        }
    }
}

impl fmt::Display for VarianceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAmount {
    pub source: String,
    pub amount_minor_units: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarianceItem {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: VarianceKind,
    pub currency: String,
    /// Summed amount per reporting source, in declared source order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub amounts_by_source: Vec<SourceAmount>,
    /// Sorted lexically. Only set for `missing_record`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarianceSummary {
    pub total: usize,
    /// Always carries every variance type, zero or not.
    pub counts_by_type: BTreeMap<String, usize>,
}

impl VarianceSummary {
    pub fn from_items(items: &[VarianceItem]) -> Self {
        let mut counts_by_type: BTreeMap<String, usize> = VarianceKind::ALL
            .iter()
            .map(|k| (k.to_string(), 0))
            .collect();
        for item in items {
            *counts_by_type.entry(item.kind.to_string()).or_insert(0) += 1;
        }
        Self {
            total: items.len(),
            counts_by_type,
        }
    }

    pub fn count(&self, kind: VarianceKind) -> usize {
        self.counts_by_type.get(kind.as_str()).copied().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Evidence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// `/`-separated, relative to the output directory.
    pub path: String,
    pub sha256: String,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceManifest {
    pub generated_at: String,
    pub tool_version: String,
    pub schema_version: String,
    pub files: Vec<ManifestEntry>,
}

/// The `engine_output.json` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOutput {
    pub schema_version: String,
    pub tool_version: String,
    pub normalization_summary: NormalizationSummary,
    pub variance_summary: VarianceSummary,
    pub normalized_records_path: String,
    pub variance_items_path: String,
    pub evidence_manifest: EvidenceManifest,
    pub deterministic_statement: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str, source: &str, amount: i64, id: &str) -> NormalizedRecord {
        NormalizedRecord {
            source: source.into(),
            key: key.into(),
            id: id.into(),
            account: String::new(),
            amount_minor_units: amount,
            currency: "USD".into(),
            timestamp: String::new(),
        }
    }

    #[test]
    fn output_order_is_key_source_amount_id() {
        let mut records = vec![
            record("k2", "a", 1, "x"),
            record("k1", "b", 1, "x"),
            record("k1", "a", 5, "x"),
            record("k1", "a", -5, "z"),
            record("k1", "a", -5, "y"),
        ];
        records.sort_by(NormalizedRecord::cmp_output_order);
        let order: Vec<_> = records
            .iter()
            .map(|r| format!("{}/{}/{}/{}", r.key, r.source, r.amount_minor_units, r.id))
            .collect();
        assert_eq!(
            order,
            vec!["k1/a/-5/y", "k1/a/-5/z", "k1/a/5/x", "k1/b/1/x", "k2/a/1/x"]
        );
    }

    #[test]
    fn empty_optional_fields_are_omitted() {
        let json = serde_json::to_string(&record("id=1", "bank", 500, "t1")).unwrap();
        assert_eq!(
            json,
            r#"{"source":"bank","key":"id=1","id":"t1","amount_minor_units":500,"currency":"USD"}"#
        );
    }

    #[test]
    fn summary_always_has_both_types() {
        let summary = VarianceSummary::from_items(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.counts_by_type.len(), 2);
        assert_eq!(summary.count(VarianceKind::MissingRecord), 0);
        assert_eq!(summary.count(VarianceKind::AmountMismatch), 0);
        assert_eq!(
            serde_json::to_string(&summary).unwrap(),
            r#"{"total":0,"counts_by_type":{"amount_mismatch":0,"missing_record":0}}"#
        );
    }

    #[test]
    fn variance_item_wire_shape() {
        let item = VarianceItem {
            key: "ref=A".into(),
            kind: VarianceKind::MissingRecord,
            currency: "EUR".into(),
            amounts_by_source: vec![SourceAmount {
                source: "ledger".into(),
                amount_minor_units: 500,
            }],
            missing_sources: vec!["bank".into()],
        };
        assert_eq!(
            serde_json::to_string(&item).unwrap(),
            r#"{"key":"ref=A","type":"missing_record","currency":"EUR","amounts_by_source":[{"source":"ledger","amount_minor_units":500}],"missing_sources":["bank"]}"#
        );
    }
}
