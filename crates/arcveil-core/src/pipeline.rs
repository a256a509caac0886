//! Pipeline orchestrator: Query → Filter → Redact → Privacy
//!
//! Each stage's designated output feeds the next stage's input; the first
//! stage to fail short-circuits the whole run with its error intact.

use crate::error::StageError;
use crate::filter::{apply_filters, FilterSpec};
use crate::privacy::{add_noise, NoiseTarget, PrivacyResponse, PrivacySpec};
use crate::query::{query_archives, QueryKind, QueryRequest, TimeRange};
use crate::redact::{redact_names, RedactionSpec};
use crate::store::ArchiveStore;
use rand::Rng;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, instrument};

fn default_limit() -> usize {
    100
}

fn default_redaction_character() -> char {
    '*'
}

fn default_preserve_length() -> bool {
    true
}

fn default_epsilon() -> f64 {
    1.0
}

fn default_sensitivity() -> f64 {
    1.0
}

/// One request carrying the parameters of all four stages.
///
/// `query_filters` is the query stage's equality map; `filters` is the
/// filter stage's rule/projection spec. Unlike the standalone redaction
/// stage, `fields_to_redact` defaults to empty here — the combined request
/// redacts only what it names.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineRequest {
    /// Query output shape fed into the filter stage
    #[serde(default)]
    pub query_type: QueryKind,
    /// Day-partition selection range
    #[serde(default)]
    pub time_range: TimeRange,
    /// Equality filters applied by the query stage
    #[serde(default)]
    pub query_filters: Map<String, Value>,
    /// Page size for the query stage
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Page offset for the query stage
    #[serde(default)]
    pub offset: usize,
    /// Field rules and projection for the filter stage
    #[serde(default)]
    pub filters: FilterSpec,
    /// Fields masked wholesale by the redaction stage
    #[serde(default)]
    pub fields_to_redact: Vec<String>,
    /// Mask character for length-preserving redaction
    #[serde(default = "default_redaction_character")]
    pub redaction_character: char,
    /// Same-length masking when true, literal marker when false
    #[serde(default = "default_preserve_length")]
    pub preserve_length: bool,
    /// Numeric fields protected by the privacy stage
    #[serde(default)]
    pub numeric_fields: Vec<String>,
    /// Privacy budget
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    /// Noise calibration sensitivity
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f64,
}

impl Default for PipelineRequest {
    fn default() -> Self {
        Self {
            query_type: QueryKind::Full,
            time_range: TimeRange::default(),
            query_filters: Map::new(),
            limit: default_limit(),
            offset: 0,
            filters: FilterSpec::default(),
            fields_to_redact: Vec::new(),
            redaction_character: default_redaction_character(),
            preserve_length: default_preserve_length(),
            numeric_fields: Vec::new(),
            epsilon: default_epsilon(),
            sensitivity: default_sensitivity(),
        }
    }
}

/// Per-stage counters from one pipeline run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineStats {
    /// Records the query stage handed to the filter stage
    pub records_fetched: usize,
    /// Records surviving the filter stage
    pub records_filtered: usize,
    /// Records processed by the redaction stage
    pub records_redacted: usize,
    /// Field values that received a noise draw
    pub noisy_fields: usize,
}

/// Run all four stages in fixed order over the archive store.
///
/// Returns the privacy stage's release plus run statistics; any stage
/// failure propagates verbatim and later stages never execute.
#[instrument(skip(store, rng, req))]
pub fn run_pipeline<S, R>(
    store: &S,
    rng: &mut R,
    req: &PipelineRequest,
) -> Result<(PrivacyResponse, PipelineStats), StageError>
where
    S: ArchiveStore + ?Sized,
    R: Rng + ?Sized,
{
    let mut stats = PipelineStats::default();

    let query_req = QueryRequest {
        query_type: req.query_type,
        time_range: req.time_range.clone(),
        filters: req.query_filters.clone(),
        limit: req.limit,
        offset: req.offset,
    };
    let query_res = query_archives(store, &query_req)?;
    // Count/summary shapes carry no data; the rest of the pipeline then
    // operates on an empty sequence.
    let records = query_res.data.unwrap_or_default();
    stats.records_fetched = records.len();

    let filter_res = apply_filters(&records, &req.filters)?;
    stats.records_filtered = filter_res.count;

    let redact_spec = RedactionSpec {
        fields_to_redact: req.fields_to_redact.clone(),
        redaction_character: req.redaction_character,
        preserve_length: req.preserve_length,
    };
    let redact_res = redact_names(&filter_res.filtered_data, &redact_spec)?;
    stats.records_redacted = redact_res.count;

    let privacy_spec = PrivacySpec {
        numeric_fields: req.numeric_fields.clone(),
        epsilon: req.epsilon,
        sensitivity: req.sensitivity,
    };
    stats.noisy_fields = redact_res
        .redacted_data
        .iter()
        .flat_map(|record| record.iter())
        .filter(|(key, value)| {
            privacy_spec.numeric_fields.iter().any(|f| f == *key) && value.is_number()
        })
        .count();
    let privacy_res = add_noise(
        NoiseTarget::Records(redact_res.redacted_data),
        &privacy_spec,
        rng,
    )?;

    info!(
        fetched = stats.records_fetched,
        filtered = stats.records_filtered,
        noisy_fields = stats.noisy_fields,
        "pipeline complete"
    );
    Ok((privacy_res, stats))
}
