use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::bundle::{archive, manifest::file_index, EvidenceFile, EvidenceFiles, ExportScope, Manifest, Snapshot};
use crate::database::RecordStore;
use crate::error::Result;
use crate::models::evidence::Evidence;
use crate::services::storage_service::FileStorage;

/// Per-record export problem; logged and reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExportIssue {
    #[error("file {path} for evidence {evidence_id} is unavailable: {reason}")]
    MissingFile {
        evidence_id: Uuid,
        path: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct ExportBundle {
    pub manifest: Manifest,
    pub files: EvidenceFiles,
    pub issues: Vec<ExportIssue>,
}

/// Serialized bundle plus what went into it, for the audit trail.
#[derive(Debug, Clone)]
pub struct ExportOutput {
    pub bytes: Vec<u8>,
    pub records: usize,
    pub files: usize,
    pub missing_files: usize,
}

impl ExportOutput {
    fn new(bundle: &ExportBundle, bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            records: bundle.manifest.records.len(),
            files: bundle.files.len(),
            missing_files: bundle.issues.len(),
        }
    }
}

#[derive(Clone)]
pub struct ExportService {
    store: Arc<dyn RecordStore>,
    storage: Arc<dyn FileStorage>,
}

impl ExportService {
    pub fn new(store: Arc<dyn RecordStore>, storage: Arc<dyn FileStorage>) -> Self {
        Self { store, storage }
    }

    pub async fn assemble(&self, scope: ExportScope) -> Result<ExportBundle> {
        let snapshot = self.store.snapshot().await?;
        Ok(self.assemble_snapshot(snapshot, scope, Utc::now()).await)
    }

    /// Builds a bundle from rows already read. Unavailable files are dropped
    /// from the bundle and their evidence rows detached.
    pub async fn assemble_snapshot(
        &self,
        mut snapshot: Snapshot,
        scope: ExportScope,
        exported_at: DateTime<Utc>,
    ) -> ExportBundle {
        let mut files = EvidenceFiles::new();
        let mut issues = Vec::new();

        match scope {
            ExportScope::Database => {
                for user in &mut snapshot.users {
                    user.password_hash = None;
                }
            }
            ExportScope::Unified => {
                for evidence in &mut snapshot.evidence {
                    if let Some(issue) = self.collect_file(evidence, &mut files).await {
                        warn!(evidence_id = %evidence.id, %issue, "exporting evidence without its file");
                        evidence.detach_file();
                        issues.push(issue);
                    }
                }
            }
        }

        let mut manifest = Manifest::new(scope, exported_at, snapshot);
        manifest.files = file_index(&files);
        ExportBundle {
            manifest,
            files,
            issues,
        }
    }

    async fn collect_file(&self, evidence: &Evidence, files: &mut EvidenceFiles) -> Option<ExportIssue> {
        let path = evidence.file_path.as_deref()?;
        let missing = |reason: String| ExportIssue::MissingFile {
            evidence_id: evidence.id,
            path: path.to_string(),
            reason,
        };

        match self.storage.read(path).await {
            Ok(Some(content)) => {
                let name = evidence
                    .display_filename()
                    .unwrap_or_else(|| evidence.id.to_string());
                files.insert(evidence.id, EvidenceFile::new(name, content));
                None
            }
            Ok(None) => Some(missing("not found".to_string())),
            Err(err) => Some(missing(err.to_string())),
        }
    }

    /// Metadata-only JSON manifest.
    pub async fn export_database(&self) -> Result<ExportOutput> {
        let bundle = self.assemble(ExportScope::Database).await?;
        let bytes = serde_json::to_vec_pretty(&bundle.manifest)?;
        info!(records = bundle.manifest.records.len(), "database export assembled");
        Ok(ExportOutput::new(&bundle, bytes))
    }

    /// Complete-system ZIP archive with evidence files.
    pub async fn export_unified(&self) -> Result<ExportOutput> {
        let bundle = self.assemble(ExportScope::Unified).await?;
        let bytes = archive::pack(&bundle.manifest, &bundle.files)?;
        info!(
            records = bundle.manifest.records.len(),
            files = bundle.files.len(),
            missing_files = bundle.issues.len(),
            "unified export assembled"
        );
        Ok(ExportOutput::new(&bundle, bytes))
    }
}
