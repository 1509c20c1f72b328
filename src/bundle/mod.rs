//! Evidence bundles: the manifest format, the ZIP codec, reference
//! resolution and the import summary.

pub mod archive;
pub mod manifest;
pub mod record;
pub mod resolver;
pub mod summary;

pub use manifest::{EvidenceFile, EvidenceFiles, ExportScope, FileEntry, Manifest, Snapshot};
pub use record::{EntityKind, Record, Reference};
pub use resolver::{InsertionPlan, KnownIds};
pub use summary::{EntityCounts, ImportSummary, RecordIssue};
