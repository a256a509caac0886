//! Differential-privacy stage: calibrated Laplace noise on numeric fields
//!
//! Noise scale is `sensitivity / epsilon`. Every field-value gets an
//! independent draw from a caller-supplied RNG so tests can seed.

use crate::error::StageError;
use crate::record::{is_integral, Record};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

fn default_epsilon() -> f64 {
    1.0
}

fn default_sensitivity() -> f64 {
    1.0
}

/// Privacy stage parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct PrivacySpec {
    /// Numeric fields to protect
    #[serde(default)]
    pub numeric_fields: Vec<String>,
    /// Privacy budget; must be positive, smaller means more noise
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    /// Maximum per-record influence on the query output
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f64,
}

impl Default for PrivacySpec {
    fn default() -> Self {
        Self {
            numeric_fields: Vec::new(),
            epsilon: default_epsilon(),
            sensitivity: default_sensitivity(),
        }
    }
}

/// Input to the privacy stage: record-level data or a single aggregate
/// mapping (counts, sums). Same per-field noise logic either way.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NoiseTarget {
    /// A sequence of records
    Records(Vec<Record>),
    /// One aggregate mapping
    Aggregate(Record),
}

impl Default for NoiseTarget {
    fn default() -> Self {
        NoiseTarget::Records(Vec::new())
    }
}

/// Disclosure parameters echoed with every noisy release.
#[derive(Debug, Clone, Serialize)]
pub struct PrivacyMetadata {
    /// Privacy budget used
    pub epsilon: f64,
    /// Sensitivity used for calibration
    pub sensitivity: f64,
    /// Noise mechanism, always `"Laplace"`
    pub mechanism: &'static str,
}

/// Privacy stage result.
#[derive(Debug, Clone, Serialize)]
pub struct PrivacyResponse {
    /// Noisy records or aggregate mapping
    pub privacy_protected_data: Value,
    /// Record count, present only when the input was a sequence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    /// Disclosure parameters
    pub privacy_metadata: PrivacyMetadata,
}

/// One draw from Laplace(0, `scale`), as the difference of two unit
/// exponentials. Both uniforms map into (0, 1], keeping the logs finite.
pub fn laplace_noise<R: Rng + ?Sized>(rng: &mut R, scale: f64) -> f64 {
    let a = 1.0 - rng.gen::<f64>();
    let b = 1.0 - rng.gen::<f64>();
    scale * (a.ln() - b.ln())
}

fn noisy_value<R: Rng + ?Sized>(value: &Value, scale: f64, rng: &mut R) -> Value {
    let Some(x) = value.as_f64() else {
        return value.clone();
    };
    let noisy = x + laplace_noise(rng, scale);
    if is_integral(value) {
        Value::from(noisy.round() as i64)
    } else {
        // Value::from maps non-finite floats to null
        Value::from(noisy)
    }
}

fn noisy_record<R: Rng + ?Sized>(
    record: &Record,
    spec: &PrivacySpec,
    scale: f64,
    rng: &mut R,
) -> Record {
    record
        .iter()
        .map(|(key, value)| {
            let out = if spec.numeric_fields.iter().any(|f| f == key)
                && matches!(value, Value::Number(_))
            {
                noisy_value(value, scale, rng)
            } else {
                value.clone()
            };
            (key.clone(), out)
        })
        .collect()
}

/// Add Laplace noise to the designated numeric fields.
///
/// Rejects `epsilon <= 0` (and NaN) with `StageError::InvalidBudget`, the
/// one validation failure this pipeline distinguishes from generic errors.
#[instrument(skip(target, spec, rng), fields(epsilon = spec.epsilon))]
pub fn add_noise<R: Rng + ?Sized>(
    target: NoiseTarget,
    spec: &PrivacySpec,
    rng: &mut R,
) -> Result<PrivacyResponse, StageError> {
    if !(spec.epsilon > 0.0) {
        return Err(StageError::InvalidBudget);
    }
    let scale = spec.sensitivity / spec.epsilon;

    let (privacy_protected_data, count) = match target {
        NoiseTarget::Records(records) => {
            let noisy: Vec<Value> = records
                .iter()
                .map(|record| Value::Object(noisy_record(record, spec, scale, rng)))
                .collect();
            let count = noisy.len();
            (Value::Array(noisy), Some(count))
        }
        NoiseTarget::Aggregate(map) => {
            (Value::Object(noisy_record(&map, spec, scale, rng)), None)
        }
    };

    debug!(scale, "noise applied");
    Ok(PrivacyResponse {
        privacy_protected_data,
        count,
        privacy_metadata: PrivacyMetadata {
            epsilon: spec.epsilon,
            sensitivity: spec.sensitivity,
            mechanism: "Laplace",
        },
    })
}
