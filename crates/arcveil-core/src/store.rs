//! Archive store adapter: day-partitioned lists of serialized records
//!
//! The core only reads. Writes (`append`) exist for ingest and tests; the
//! store itself is owned by whoever embeds the pipeline.

use crate::error::StageError;
use chrono::{TimeZone, Utc};
use dashmap::DashMap;
use std::ops::RangeInclusive;

/// Seconds per calendar day; partition enumeration steps by this.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Keyed store of serialized records, partitioned by calendar day.
///
/// Implementations must be safe for concurrent reads; the pipeline treats
/// the store as read-only.
pub trait ArchiveStore: Send + Sync {
    /// True if the partition holds at least one entry.
    fn exists(&self, key: &str) -> bool;
    /// All serialized entries in the partition, oldest first. Missing
    /// partitions yield an empty list.
    fn read_all(&self, key: &str) -> Vec<String>;
    /// Append one serialized entry to the partition.
    fn append(&self, key: &str, entry: String);
}

/// In-memory reference store, also the test double.
#[derive(Debug, Default)]
pub struct MemoryArchiveStore {
    partitions: DashMap<String, Vec<String>>,
}

impl MemoryArchiveStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of partitions that currently hold entries.
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }
}

impl ArchiveStore for MemoryArchiveStore {
    fn exists(&self, key: &str) -> bool {
        self.partitions.contains_key(key)
    }

    fn read_all(&self, key: &str) -> Vec<String> {
        self.partitions
            .get(key)
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    fn append(&self, key: &str, entry: String) {
        self.partitions.entry(key.to_string()).or_default().push(entry);
    }
}

/// Partition key for the day containing `ts` (unix seconds, UTC):
/// `archive:<YYYY-MM-DD>`.
pub fn partition_key(ts: i64) -> Result<String, StageError> {
    let day = Utc
        .timestamp_opt(ts, 0)
        .single()
        .ok_or_else(|| StageError::internal(format!("timestamp out of range: {ts}")))?;
    Ok(format!("archive:{}", day.format("%Y-%m-%d")))
}

/// Day indices (days since the epoch, UTC) for every calendar day touched
/// by `[start, end]`, inclusive of both endpoints. An inverted range
/// selects nothing.
///
/// Normalizing to day indices (`div_euclid`) means a range that crosses
/// midnight selects both days even when it spans less than 24 hours.
/// Callers iterate the indices and probe `exists` per day instead of
/// materializing a key list, so arbitrarily wide ranges, including the
/// default `[0, now]`, stay cheap. Endpoints that do not map to a
/// representable date are rejected up front.
#[allow(clippy::reversed_empty_ranges)]
pub fn partition_days(start: i64, end: i64) -> Result<RangeInclusive<i64>, StageError> {
    if start > end {
        return Ok(1..=0);
    }
    partition_key(start)?;
    partition_key(end)?;
    Ok(start.div_euclid(SECONDS_PER_DAY)..=end.div_euclid(SECONDS_PER_DAY))
}
