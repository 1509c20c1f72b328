use std::collections::HashSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::bundle::{EntityKind, Record, Snapshot};
use crate::error::Result;
use crate::models::organization::Organization;

/// Result of a single insert attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A row with the same primary key is already there; nothing was written.
    AlreadyExists,
    /// Rejected by a foreign-key, uniqueness, not-null or check constraint.
    Violated(String),
}

/// Record access used by the bundle services.
///
/// Constraint violations are returned as [`InsertOutcome::Violated`]; `Err` is
/// reserved for failures of the store itself.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every row of every exportable type, oldest first within a type.
    async fn snapshot(&self) -> Result<Snapshot>;

    /// The subset of `ids` that exist as rows of `kind`.
    async fn existing_ids(&self, kind: EntityKind, ids: &[Uuid]) -> Result<HashSet<Uuid>>;

    async fn insert(&self, record: &Record) -> Result<InsertOutcome>;

    async fn clear_evidence_file(&self, evidence_id: Uuid) -> Result<()>;

    /// Case-insensitive match on organization name or code.
    async fn find_organization(&self, name_or_code: &str) -> Result<Option<Organization>>;
}
