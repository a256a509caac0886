//! Filter stage: per-field predicate rules and field projection

use crate::error::StageError;
use crate::record::Record;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Inclusive numeric bounds; each side is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RangeRule {
    /// Lower bound (inclusive)
    pub min: Option<f64>,
    /// Upper bound (inclusive)
    pub max: Option<f64>,
}

/// Predicate rules for a single field. Sub-rules are conjunctive and the
/// first failing one short-circuits.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldRule {
    /// Numeric range check; non-numeric values under this rule are an error
    pub range: Option<RangeRule>,
    /// Pattern matched against the stringified value, anchored at position 0
    pub regex: Option<String>,
    /// Set membership by JSON-value equality
    #[serde(rename = "in")]
    pub member_of: Option<Vec<Value>>,
}

/// Filter stage parameters: field rules plus projection lists.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterSpec {
    /// When non-empty, output records contain only these keys
    #[serde(default)]
    pub include_fields: Vec<String>,
    /// Keys dropped from output records when `include_fields` is empty
    #[serde(default)]
    pub exclude_fields: Vec<String>,
    /// Field name → predicate rule, all of which a record must satisfy
    #[serde(default)]
    pub field_rules: BTreeMap<String, FieldRule>,
}

/// Filter stage result.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FilterResponse {
    /// Surviving records after rules and projection
    pub filtered_data: Vec<Record>,
    /// Number of surviving records
    pub count: usize,
}

/// A field rule with its regex compiled once per invocation.
struct PreparedRule<'a> {
    field: &'a str,
    range: Option<&'a RangeRule>,
    regex: Option<Regex>,
    member_of: Option<&'a [Value]>,
}

fn prepare_rules(spec: &FilterSpec) -> Result<Vec<PreparedRule<'_>>, StageError> {
    spec.field_rules
        .iter()
        .map(|(field, rule)| {
            let regex = rule
                .regex
                .as_deref()
                .map(|pattern| {
                    // Prefix-match semantics: anchor at the start, do not
                    // require the pattern to consume the whole value.
                    Regex::new(&format!("^(?:{pattern})")).map_err(|e| {
                        StageError::internal(format!("invalid regex for field {field}: {e}"))
                    })
                })
                .transpose()?;
            Ok(PreparedRule {
                field,
                range: rule.range.as_ref(),
                regex,
                member_of: rule.member_of.as_deref(),
            })
        })
        .collect()
}

/// Stringified form of a value for regex matching: strings as-is, everything
/// else rendered as JSON.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn rule_passes(value: &Value, rule: &PreparedRule<'_>) -> Result<bool, StageError> {
    if let Some(range) = rule.range {
        let n = value.as_f64().ok_or_else(|| {
            StageError::internal(format!(
                "range rule on field {} requires a numeric value",
                rule.field
            ))
        })?;
        if let Some(min) = range.min {
            if n < min {
                return Ok(false);
            }
        }
        if let Some(max) = range.max {
            if n > max {
                return Ok(false);
            }
        }
    }
    if let Some(regex) = &rule.regex {
        if !regex.is_match(&stringify(value)) {
            return Ok(false);
        }
    }
    if let Some(allowed) = rule.member_of {
        if !allowed.contains(value) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Apply field rules and projection to a sequence of records.
///
/// A record is dropped entirely when a ruled field is absent or fails any
/// sub-rule. Projection then keeps `include_fields` (present-if-exists) or,
/// when that list is empty, everything except `exclude_fields`.
#[instrument(skip(records, spec), fields(records = records.len()))]
pub fn apply_filters(
    records: &[Record],
    spec: &FilterSpec,
) -> Result<FilterResponse, StageError> {
    let rules = prepare_rules(spec)?;

    let mut filtered_data = Vec::new();
    'records: for record in records {
        for rule in &rules {
            match record.get(rule.field) {
                None => continue 'records,
                Some(value) => {
                    if !rule_passes(value, rule)? {
                        continue 'records;
                    }
                }
            }
        }

        let projected: Record = if !spec.include_fields.is_empty() {
            spec.include_fields
                .iter()
                .filter_map(|field| {
                    record
                        .get(field)
                        .map(|value| (field.clone(), value.clone()))
                })
                .collect()
        } else {
            record
                .iter()
                .filter(|(key, _)| !spec.exclude_fields.contains(key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        };
        filtered_data.push(projected);
    }

    debug!(kept = filtered_data.len(), "filter complete");
    let count = filtered_data.len();
    Ok(FilterResponse {
        filtered_data,
        count,
    })
}
