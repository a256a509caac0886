//! Query stage: select records across a day-partitioned range, apply
//! equality filters, paginate, and shape the output.

use crate::error::StageError;
use crate::record::Record;
use crate::store::{partition_days, partition_key, ArchiveStore, SECONDS_PER_DAY};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

fn default_limit() -> usize {
    100
}

/// Output shape selector. Unknown strings fall back to `Full`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    /// `{count}` only
    Count,
    /// `{count, summary: [{id, timestamp}]}` over the paginated slice
    Summary,
    /// `{count, data}` over the paginated slice
    #[default]
    #[serde(other)]
    Full,
}

/// Inclusive unix-second range selecting day partitions.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeRange {
    /// Range start (inclusive); defaults to the epoch.
    #[serde(default)]
    pub start: i64,
    /// Range end (inclusive); defaults to now when absent.
    #[serde(default)]
    pub end: Option<i64>,
}

impl Default for TimeRange {
    fn default() -> Self {
        Self {
            start: 0,
            end: None,
        }
    }
}

/// Parameters for one query-stage invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    /// Output shape
    #[serde(default)]
    pub query_type: QueryKind,
    /// Day-partition selection range
    #[serde(default)]
    pub time_range: TimeRange,
    /// Equality filters: a record is retained iff every `(key, value)` pair
    /// matches exactly (missing key rejects)
    #[serde(default)]
    pub filters: Map<String, Value>,
    /// Page size, applied after cross-partition filtering
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Page offset into the retained set
    #[serde(default)]
    pub offset: usize,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self {
            query_type: QueryKind::Full,
            time_range: TimeRange::default(),
            filters: Map::new(),
            limit: default_limit(),
            offset: 0,
        }
    }
}

/// `{id, timestamp}` projection used by the summary shape. Fields absent
/// from the source record serialize as null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryEntry {
    /// Record id, if present
    pub id: Value,
    /// Record timestamp, if present
    pub timestamp: Value,
}

/// Query stage result. `count` always reflects the unpaginated retained-set
/// size; `data`/`summary` cover only the requested page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Retained-set size before pagination
    pub count: usize,
    /// Paginated records (`Full` shape only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Record>>,
    /// Paginated `{id, timestamp}` projections (`Summary` shape only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Vec<SummaryEntry>>,
}

/// Select records from the archive store.
///
/// Missing partitions and undecodable entries are skipped silently;
/// malformed time ranges surface as `StageError::Internal`.
#[instrument(skip(store, req), fields(query_type = ?req.query_type))]
pub fn query_archives<S: ArchiveStore + ?Sized>(
    store: &S,
    req: &QueryRequest,
) -> Result<QueryResponse, StageError> {
    let start = req.time_range.start;
    let end = req.time_range.end.unwrap_or_else(|| Utc::now().timestamp());

    let mut retained: Vec<Record> = Vec::new();
    let mut scanned = 0usize;
    for day in partition_days(start, end)? {
        let key = partition_key(day * SECONDS_PER_DAY)?;
        if !store.exists(&key) {
            continue;
        }
        scanned += 1;
        for raw in store.read_all(&key) {
            // Undecodable or non-object entries are skipped, never surfaced.
            let Ok(Value::Object(record)) = serde_json::from_str::<Value>(&raw) else {
                continue;
            };
            if req
                .filters
                .iter()
                .all(|(k, v)| record.get(k) == Some(v))
            {
                retained.push(record);
            }
        }
    }

    let count = retained.len();
    let page: Vec<Record> = retained
        .into_iter()
        .skip(req.offset)
        .take(req.limit)
        .collect();
    debug!(
        partitions = scanned,
        count,
        page = page.len(),
        "query complete"
    );

    Ok(match req.query_type {
        QueryKind::Count => QueryResponse {
            count,
            data: None,
            summary: None,
        },
        QueryKind::Summary => QueryResponse {
            count,
            data: None,
            summary: Some(
                page.iter()
                    .map(|record| SummaryEntry {
                        id: record.get("id").cloned().unwrap_or(Value::Null),
                        timestamp: record.get("timestamp").cloned().unwrap_or(Value::Null),
                    })
                    .collect(),
            ),
        },
        QueryKind::Full => QueryResponse {
            count,
            data: Some(page),
            summary: None,
        },
    })
}
