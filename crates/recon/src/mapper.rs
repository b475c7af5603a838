use crate::config::{FieldMapping, MappingConfig, Ruleset};
use crate::value::RawRecord;

/// Canonical name the record id is stored under.
pub const ID_FIELD: &str = "id";
/// Canonical name the account is stored under.
pub const ACCOUNT_FIELD: &str = "account";

/// Rewrite a raw record into canonical field names.
///
/// Starts from the raw record and, for every logical field with a mapped raw
/// name, overwrites the canonical field with the value found under that raw
/// name (empty if the raw record lacks it). Sources absent from `mapping` use
/// [`FieldMapping::identity`].
pub fn map_record(
    record: &RawRecord,
    source: &str,
    ruleset: &Ruleset,
    mapping: &MappingConfig,
) -> RawRecord {
    let identity;
    let field_mapping = match mapping.for_source(source) {
        Some(m) => m,
        None => {
            identity = FieldMapping::identity(ruleset);
            &identity
        }
    };

    let mut mapped = record.clone();
    let targets = [
        (&field_mapping.id, ID_FIELD),
        (&field_mapping.amount, ruleset.amount_field.as_str()),
        (&field_mapping.currency, ruleset.currency_field.as_str()),
        (&field_mapping.timestamp, ruleset.timestamp_field.as_str()),
        (&field_mapping.account, ACCOUNT_FIELD),
    ];
    for (raw_name, canonical) in targets {
        if let Some(raw_name) = raw_name.as_deref().filter(|n| !n.is_empty()) {
            let value = record.get(raw_name).cloned().unwrap_or_default();
            mapped.insert(canonical.to_string(), value);
        }
    }

    mapped
}
