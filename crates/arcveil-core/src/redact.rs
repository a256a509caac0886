//! Redaction stage: mask designated fields and scan the rest for
//! name-shaped text
//!
//! The pattern scan is a best-effort heuristic: it catches two-token
//! title-cased names ("John Smith") and nothing else.

use crate::error::StageError;
use crate::record::{Record, DEFAULT_REDACT_FIELDS};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::{debug, instrument};

/// Literal marker substituted for matched names and for whole-field
/// redaction when length preservation is off.
pub const REDACTED_MARKER: &str = "[REDACTED]";

static NAME_PATTERN: OnceLock<Regex> = OnceLock::new();

fn name_pattern() -> &'static Regex {
    NAME_PATTERN.get_or_init(|| {
        Regex::new(r"\b[A-Z][a-z]+ [A-Z][a-z]+\b").expect("static name pattern compiles")
    })
}

fn default_fields_to_redact() -> Vec<String> {
    DEFAULT_REDACT_FIELDS.iter().map(|s| s.to_string()).collect()
}

fn default_redaction_character() -> char {
    '*'
}

fn default_preserve_length() -> bool {
    true
}

/// Redaction stage parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct RedactionSpec {
    /// Fields whose entire string value is masked
    #[serde(default = "default_fields_to_redact")]
    pub fields_to_redact: Vec<String>,
    /// Mask character for length-preserving redaction
    #[serde(default = "default_redaction_character")]
    pub redaction_character: char,
    /// Same-length masking when true, literal `[REDACTED]` when false
    #[serde(default = "default_preserve_length")]
    pub preserve_length: bool,
}

impl Default for RedactionSpec {
    fn default() -> Self {
        Self {
            fields_to_redact: default_fields_to_redact(),
            redaction_character: default_redaction_character(),
            preserve_length: default_preserve_length(),
        }
    }
}

/// Redaction stage result.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RedactResponse {
    /// Records with name-bearing fields masked
    pub redacted_data: Vec<Record>,
    /// Number of records processed
    pub count: usize,
}

fn redact_value(key: &str, value: &Value, spec: &RedactionSpec) -> Value {
    match value {
        Value::String(text) if spec.fields_to_redact.iter().any(|f| f == key) => {
            if spec.preserve_length {
                Value::String(
                    spec.redaction_character
                        .to_string()
                        .repeat(text.chars().count()),
                )
            } else {
                Value::String(REDACTED_MARKER.to_string())
            }
        }
        Value::String(text) => {
            Value::String(name_pattern().replace_all(text, REDACTED_MARKER).into_owned())
        }
        // Non-text values (including nested mappings) pass through untouched.
        other => other.clone(),
    }
}

/// Mask designated fields and scan all other string fields for two-token
/// title-cased names.
#[instrument(skip(records, spec), fields(records = records.len()))]
pub fn redact_names(
    records: &[Record],
    spec: &RedactionSpec,
) -> Result<RedactResponse, StageError> {
    let redacted_data: Vec<Record> = records
        .iter()
        .map(|record| {
            record
                .iter()
                .map(|(key, value)| (key.clone(), redact_value(key, value, spec)))
                .collect()
        })
        .collect();

    debug!(count = redacted_data.len(), "redaction complete");
    let count = redacted_data.len();
    Ok(RedactResponse {
        redacted_data,
        count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("test records must be objects"),
        }
    }

    #[test]
    fn length_preserving_mask() {
        let records = vec![record(json!({"name": "Bob"}))];
        let res = redact_names(&records, &RedactionSpec::default()).unwrap();
        assert_eq!(res.redacted_data[0]["name"], json!("***"));
    }

    #[test]
    fn non_preserving_mask_uses_marker() {
        let records = vec![record(json!({"name": "Bob"}))];
        let spec = RedactionSpec {
            preserve_length: false,
            ..Default::default()
        };
        let res = redact_names(&records, &spec).unwrap();
        assert_eq!(res.redacted_data[0]["name"], json!("[REDACTED]"));
    }

    #[test]
    fn custom_redaction_character() {
        let records = vec![record(json!({"username": "carol"}))];
        let spec = RedactionSpec {
            redaction_character: '#',
            ..Default::default()
        };
        let res = redact_names(&records, &spec).unwrap();
        assert_eq!(res.redacted_data[0]["username"], json!("#####"));
    }

    #[test]
    fn mask_length_counts_chars_not_bytes() {
        let records = vec![record(json!({"name": "Zoé"}))];
        let res = redact_names(&records, &RedactionSpec::default()).unwrap();
        assert_eq!(res.redacted_data[0]["name"], json!("***"));
    }

    #[test]
    fn name_pattern_scan_in_other_fields() {
        let records = vec![record(json!({"bio": "Met John Smith yesterday."}))];
        let res = redact_names(&records, &RedactionSpec::default()).unwrap();
        // leftmost match wins: the scan consumes "Met John" and leaves
        // "Smith" behind, over-redacting the capitalized verb
        assert_eq!(
            res.redacted_data[0]["bio"],
            json!("[REDACTED] Smith yesterday.")
        );
    }

    #[test]
    fn name_pattern_replaces_every_match() {
        let records = vec![record(json!({
            "bio": "Alice Lee introduced Bob Young to the team."
        }))];
        let res = redact_names(&records, &RedactionSpec::default()).unwrap();
        assert_eq!(
            res.redacted_data[0]["bio"],
            json!("[REDACTED] introduced [REDACTED] to the team.")
        );
    }

    #[test]
    fn lowercase_and_single_token_names_escape_the_heuristic() {
        let records = vec![record(json!({"bio": "met john smith and Cher"}))];
        let res = redact_names(&records, &RedactionSpec::default()).unwrap();
        assert_eq!(res.redacted_data[0]["bio"], json!("met john smith and Cher"));
    }

    #[test]
    fn redact_listed_field_skips_pattern_scan() {
        // A listed field is masked wholesale even when no name-shape matches.
        let records = vec![record(json!({"name": "xyzzy"}))];
        let res = redact_names(&records, &RedactionSpec::default()).unwrap();
        assert_eq!(res.redacted_data[0]["name"], json!("*****"));
    }

    #[test]
    fn non_text_values_pass_through() {
        let records = vec![record(json!({
            "name": 42,
            "score": 1.5,
            "active": true,
            "meta": {"contact": "John Smith"},
            "note": null
        }))];
        let res = redact_names(&records, &RedactionSpec::default()).unwrap();
        let out = &res.redacted_data[0];
        assert_eq!(out["name"], json!(42));
        assert_eq!(out["score"], json!(1.5));
        assert_eq!(out["active"], json!(true));
        // no recursion into nested mappings
        assert_eq!(out["meta"], json!({"contact": "John Smith"}));
        assert_eq!(out["note"], Value::Null);
    }

    #[test]
    fn empty_redact_list_disables_whole_field_masking() {
        let records = vec![record(json!({"name": "Alice Lee"}))];
        let spec = RedactionSpec {
            fields_to_redact: Vec::new(),
            ..Default::default()
        };
        let res = redact_names(&records, &spec).unwrap();
        // field no longer listed, so only the pattern scan applies
        assert_eq!(res.redacted_data[0]["name"], json!("[REDACTED]"));
    }
}
