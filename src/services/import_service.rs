//! Reconciles an incoming bundle with the destination database.
//!
//! A run moves through `Validating`, `Planning`, one `Inserting` pass per
//! entity type and `Reporting`. Validation failures abort before anything is
//! written; per-record problems are counted in the [`ImportSummary`].

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bundle::{
    archive, resolver::referenced_ids, EntityKind, EvidenceFiles, ImportSummary, InsertionPlan,
    KnownIds, Record, RecordIssue, Snapshot,
};
use crate::database::{InsertOutcome, RecordStore};
use crate::error::Result;
use crate::models::evidence::Evidence;
use crate::services::storage_service::{evidence_path, FileStorage};
use crate::utils::crypto::placeholder_password_hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportPhase {
    Validating,
    Planning,
    Inserting(EntityKind),
    Reporting,
}

impl std::fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportPhase::Validating => f.write_str("validating"),
            ImportPhase::Planning => f.write_str("planning"),
            ImportPhase::Inserting(kind) => write!(f, "inserting {}", kind),
            ImportPhase::Reporting => f.write_str("reporting"),
        }
    }
}

/// Book-keeping for one import run.
struct ImportRun {
    id: Uuid,
    phase: ImportPhase,
    summary: ImportSummary,
}

impl ImportRun {
    fn start() -> Self {
        let run = Self {
            id: Uuid::new_v4(),
            phase: ImportPhase::Validating,
            summary: ImportSummary::default(),
        };
        debug!(run_id = %run.id, phase = %run.phase, "import started");
        run
    }

    fn enter(&mut self, phase: ImportPhase) {
        self.phase = phase;
        debug!(run_id = %self.id, phase = %self.phase, "import phase");
    }

    fn reject(&mut self, kind: EntityKind, id: Uuid, issue: &RecordIssue) {
        warn!(run_id = %self.id, kind = %kind, id = %id, %issue, "record not imported");
        self.summary.record_failed(kind);
    }
}

#[derive(Clone)]
pub struct ImportService {
    store: Arc<dyn RecordStore>,
    storage: Arc<dyn FileStorage>,
}

impl ImportService {
    pub fn new(store: Arc<dyn RecordStore>, storage: Arc<dyn FileStorage>) -> Self {
        Self { store, storage }
    }

    /// Imports a bare JSON manifest. Evidence file paths are kept as metadata.
    pub async fn import_database(&self, bytes: &[u8]) -> Result<ImportSummary> {
        let mut run = ImportRun::start();
        let manifest = archive::parse_manifest(bytes)?;
        run.enter(ImportPhase::Planning);
        self.reconcile(run, manifest.records, EvidenceFiles::new()).await
    }

    /// Imports a ZIP bundle, storing the blobs of newly inserted evidence.
    pub async fn import_unified(&self, bytes: &[u8]) -> Result<ImportSummary> {
        let mut run = ImportRun::start();
        let (manifest, files) = archive::unpack(bytes)?;
        run.enter(ImportPhase::Planning);
        self.reconcile(run, manifest.records, files).await
    }

    async fn reconcile(
        &self,
        mut run: ImportRun,
        snapshot: Snapshot,
        files: EvidenceFiles,
    ) -> Result<ImportSummary> {
        let mut records = snapshot.into_records();
        for record in &mut records {
            if let Record::Evidence(evidence) = record {
                if let Some(file) = files.get(&evidence.id) {
                    evidence.file_path = Some(evidence_path(evidence.id, &file.original_filename));
                    evidence.original_filename = Some(file.original_filename.clone());
                }
            }
        }
        let present_users = self.present_users_without_hash(&records).await?;

        let destination = self.destination_ids(&records).await?;
        let plan = InsertionPlan::build(records, &destination);
        for rejection in &plan.rejected {
            run.reject(rejection.kind, rejection.id, &rejection.issue);
        }

        for kind in EntityKind::INSERT_ORDER {
            run.enter(ImportPhase::Inserting(kind));
            for record in plan.pass(kind) {
                let outcome = match record {
                    Record::User(user) if user.password_hash.is_none() => {
                        if present_users.contains(&user.id) {
                            InsertOutcome::AlreadyExists
                        } else {
                            let mut user = user.clone();
                            user.password_hash = Some(placeholder_password_hash()?);
                            self.store.insert(&Record::User(user)).await?
                        }
                    }
                    _ => self.store.insert(record).await?,
                };
                match outcome {
                    InsertOutcome::Inserted => {
                        run.summary.record_inserted(kind);
                        if let Record::Evidence(evidence) = record {
                            self.store_file(&mut run, evidence, &files).await?;
                        }
                    }
                    InsertOutcome::AlreadyExists => {
                        debug!(run_id = %run.id, kind = %kind, id = %record.id(), "already present, skipped");
                        run.summary.record_skipped(kind);
                    }
                    InsertOutcome::Violated(message) => {
                        run.reject(kind, record.id(), &RecordIssue::ConstraintViolation(message));
                    }
                }
            }
        }

        run.enter(ImportPhase::Reporting);
        info!(
            run_id = %run.id,
            imported = run.summary.total,
            skipped = run.summary.skipped.rows(),
            errors = run.summary.error_count(),
            "import completed"
        );
        Ok(run.summary)
    }

    async fn destination_ids(&self, records: &[Record]) -> Result<KnownIds> {
        let mut known = KnownIds::new();
        for (kind, ids) in referenced_ids(records) {
            let ids: Vec<Uuid> = ids.into_iter().collect();
            known.extend(kind, self.store.existing_ids(kind, &ids).await?);
        }
        Ok(known)
    }

    /// Users arriving without a hash that the destination already holds. They
    /// are skipped without paying for a placeholder hash.
    async fn present_users_without_hash(&self, records: &[Record]) -> Result<HashSet<Uuid>> {
        let ids: Vec<Uuid> = records
            .iter()
            .filter_map(|r| match r {
                Record::User(user) if user.password_hash.is_none() => Some(user.id),
                _ => None,
            })
            .collect();
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        self.store.existing_ids(EntityKind::User, &ids).await
    }

    async fn store_file(&self, run: &mut ImportRun, evidence: &Evidence, files: &EvidenceFiles) -> Result<()> {
        let (Some(file), Some(path)) = (files.get(&evidence.id), evidence.file_path.as_deref()) else {
            return Ok(());
        };

        match self.storage.write(path, &file.content).await {
            Ok(()) => run.summary.imported.evidence_files += 1,
            Err(err) => {
                warn!(run_id = %run.id, evidence_id = %evidence.id, error = %err, "evidence file not stored");
                self.store.clear_evidence_file(evidence.id).await?;
                run.summary.errors.evidence_files += 1;
            }
        }
        Ok(())
    }
}
