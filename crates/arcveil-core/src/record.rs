//! Record model: heterogeneous JSON-shaped rows read from the archive store

use serde_json::{Map, Value};

/// A single archived record. Field sets are not fixed; records in the same
/// query result may have different shapes, and values carry their runtime
/// variant tag (string, number, bool, null, object, array).
pub type Record = Map<String, Value>;

/// Fields masked by the redaction stage when the caller does not supply an
/// explicit list. Immutable by construction so no invocation can leak state
/// into the next.
pub const DEFAULT_REDACT_FIELDS: &[&str] = &["name", "full_name", "username"];

/// True if the value is a JSON number without a fractional representation.
/// The privacy stage rounds noised integral values back to integers.
pub fn is_integral(value: &Value) -> bool {
    matches!(value, Value::Number(n) if n.is_i64() || n.is_u64())
}
