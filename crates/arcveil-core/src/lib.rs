#![warn(missing_docs)]

//! Arcveil core: privacy-preserving processing of archived records
//!
//! Pipeline: Query (day-partitioned archive) → Filter (field rules) →
//! Redact (name masking) → Privacy (Laplace noise)

pub mod error;
pub mod filter;
pub mod pipeline;
pub mod privacy;
pub mod query;
pub mod record;
pub mod redact;
pub mod store;

pub use error::StageError;
pub use filter::{apply_filters, FieldRule, FilterResponse, FilterSpec, RangeRule};
pub use pipeline::{run_pipeline, PipelineRequest, PipelineStats};
pub use privacy::{add_noise, NoiseTarget, PrivacyMetadata, PrivacyResponse, PrivacySpec};
pub use query::{query_archives, QueryKind, QueryRequest, QueryResponse, SummaryEntry, TimeRange};
pub use record::{Record, DEFAULT_REDACT_FIELDS};
pub use redact::{redact_names, RedactResponse, RedactionSpec};
pub use store::{partition_days, partition_key, ArchiveStore, MemoryArchiveStore};
