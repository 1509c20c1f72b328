use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{
    audit_log::AuditLog, billable_event::BillableEvent, comment::Comment,
    compliance_item::ComplianceItem, contract::Contract, evidence::Evidence,
    organization::Organization, user::User,
};

pub const FORMAT_VERSION: u32 = 1;
pub const MANIFEST_PATH: &str = "manifest.json";
pub const FILES_DIR: &str = "files";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportScope {
    /// Metadata only: no password hashes, no file blobs.
    Database,
    /// Complete system: password hashes and evidence files.
    Unified,
}

impl ExportScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportScope::Database => "database",
            ExportScope::Unified => "unified",
        }
    }
}

/// Every exportable row, one array per entity type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub organizations: Vec<Organization>,
    #[serde(default)]
    pub contracts: Vec<Contract>,
    #[serde(default)]
    pub compliance_items: Vec<ComplianceItem>,
    #[serde(default)]
    pub billable_events: Vec<BillableEvent>,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub audit_logs: Vec<AuditLog>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.users.len()
            + self.organizations.len()
            + self.contracts.len()
            + self.compliance_items.len()
            + self.billable_events.len()
            + self.evidence.len()
            + self.comments.len()
            + self.audit_logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub format_version: u32,
    pub exported_at: DateTime<Utc>,
    pub scope: ExportScope,
    #[serde(flatten)]
    pub records: Snapshot,
    /// Index of the blobs stored under `files/`, keyed by evidence id.
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

impl Manifest {
    pub fn new(scope: ExportScope, exported_at: DateTime<Utc>, records: Snapshot) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            exported_at,
            scope,
            records,
            files: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub evidence_id: Uuid,
    pub original_filename: String,
    pub size: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceFile {
    pub original_filename: String,
    pub content: Vec<u8>,
}

impl EvidenceFile {
    pub fn new(original_filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            original_filename: original_filename.into(),
            content,
        }
    }

    pub fn entry(&self, evidence_id: Uuid) -> FileEntry {
        FileEntry {
            evidence_id,
            original_filename: self.original_filename.clone(),
            size: self.content.len() as u64,
            sha256: sha256_hex(&self.content),
        }
    }
}

/// Evidence id to file blob; ordered so archives come out identical for equal input.
pub type EvidenceFiles = BTreeMap<Uuid, EvidenceFile>;

pub fn file_index(files: &EvidenceFiles) -> Vec<FileEntry> {
    files.iter().map(|(id, file)| file.entry(*id)).collect()
}

pub fn blob_path(evidence_id: Uuid) -> String {
    format!("{}/{}", FILES_DIR, evidence_id)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
