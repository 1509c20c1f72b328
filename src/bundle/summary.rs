use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::record::{EntityKind, Reference};

/// Per-record outcome that is counted rather than raised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordIssue {
    #[error("{field} references missing {target_kind} {target_id}")]
    DanglingReference {
        field: &'static str,
        target_kind: EntityKind,
        target_id: Uuid,
    },
    #[error("a row with this id already exists")]
    DuplicateKey,
    #[error("{field} cannot be stored: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

impl From<Reference> for RecordIssue {
    fn from(reference: Reference) -> Self {
        RecordIssue::DanglingReference {
            field: reference.field,
            target_kind: reference.kind,
            target_id: reference.id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntityCounts {
    pub users: u64,
    pub organizations: u64,
    pub contracts: u64,
    pub compliance_items: u64,
    pub billable_events: u64,
    pub evidence_records: u64,
    pub evidence_files: u64,
    pub comments: u64,
    pub audit_logs: u64,
}

impl EntityCounts {
    pub fn get(&self, kind: EntityKind) -> u64 {
        match kind {
            EntityKind::User => self.users,
            EntityKind::Organization => self.organizations,
            EntityKind::Contract => self.contracts,
            EntityKind::ComplianceItem => self.compliance_items,
            EntityKind::BillableEvent => self.billable_events,
            EntityKind::Evidence => self.evidence_records,
            EntityKind::Comment => self.comments,
            EntityKind::AuditLog => self.audit_logs,
        }
    }

    pub fn bump(&mut self, kind: EntityKind) {
        let slot = match kind {
            EntityKind::User => &mut self.users,
            EntityKind::Organization => &mut self.organizations,
            EntityKind::Contract => &mut self.contracts,
            EntityKind::ComplianceItem => &mut self.compliance_items,
            EntityKind::BillableEvent => &mut self.billable_events,
            EntityKind::Evidence => &mut self.evidence_records,
            EntityKind::Comment => &mut self.comments,
            EntityKind::AuditLog => &mut self.audit_logs,
        };
        *slot += 1;
    }

    /// Rows across all entity types; evidence files ride along with their records.
    pub fn rows(&self) -> u64 {
        EntityKind::INSERT_ORDER.iter().map(|k| self.get(*k)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows() == 0 && self.evidence_files == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub imported: EntityCounts,
    pub skipped: EntityCounts,
    #[serde(default, skip_serializing_if = "EntityCounts::is_empty")]
    pub errors: EntityCounts,
    pub total: u64,
}

impl ImportSummary {
    pub fn record_inserted(&mut self, kind: EntityKind) {
        self.imported.bump(kind);
        self.total = self.imported.rows();
    }

    pub fn record_skipped(&mut self, kind: EntityKind) {
        self.skipped.bump(kind);
    }

    pub fn record_failed(&mut self, kind: EntityKind) {
        self.errors.bump(kind);
    }

    pub fn error_count(&self) -> u64 {
        self.errors.rows() + self.errors.evidence_files
    }
}
