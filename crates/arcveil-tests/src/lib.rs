//! Arcveil test and validation infrastructure
//!
//! Cross-crate scenarios for the privacy pipeline and the HTTP gateway,
//! plus property-based checks of the pagination and filtering invariants.

pub mod gateway_integration;
pub mod pipeline_integration;
pub mod proptest_pipeline;

use arcveil_core::{ArchiveStore, MemoryArchiveStore, Record};
use serde_json::json;

/// Day used by scenario fixtures: 2024-01-15T00:00:00Z.
pub const FIXTURE_DAY: i64 = 1_705_276_800;

/// A store seeded with the canonical two-record scenario.
pub fn scenario_store() -> MemoryArchiveStore {
    let store = MemoryArchiveStore::new();
    store.append(
        "archive:2024-01-15",
        json!({"id": "a", "score": 10, "name": "Alice Lee", "timestamp": FIXTURE_DAY}).to_string(),
    );
    store.append(
        "archive:2024-01-15",
        json!({"id": "b", "score": 5, "name": "Bob Young", "timestamp": FIXTURE_DAY}).to_string(),
    );
    store
}

/// Build a record from a JSON object literal.
pub fn record(value: serde_json::Value) -> Record {
    match value {
        serde_json::Value::Object(map) => map,
        _ => panic!("fixture records must be objects"),
    }
}
