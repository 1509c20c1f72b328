use std::net::IpAddr;

use serde::Serialize;
use uuid::Uuid;

use super::manifest::Snapshot;
use super::summary::RecordIssue;
use crate::models::{
    audit_log::AuditLog, billable_event::BillableEvent, comment::{Comment, CommentParent},
    compliance_item::ComplianceItem, contract::Contract, evidence::Evidence,
    organization::Organization, user::User,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    User,
    Organization,
    Contract,
    ComplianceItem,
    BillableEvent,
    Evidence,
    Comment,
    AuditLog,
}

impl EntityKind {
    /// Referenced types always come before the types that reference them.
    pub const INSERT_ORDER: [EntityKind; 8] = [
        EntityKind::User,
        EntityKind::Organization,
        EntityKind::Contract,
        EntityKind::ComplianceItem,
        EntityKind::BillableEvent,
        EntityKind::Evidence,
        EntityKind::Comment,
        EntityKind::AuditLog,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Organization => "organization",
            EntityKind::Contract => "contract",
            EntityKind::ComplianceItem => "compliance_item",
            EntityKind::BillableEvent => "billable_event",
            EntityKind::Evidence => "evidence",
            EntityKind::Comment => "comment",
            EntityKind::AuditLog => "audit_log",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::User => "users",
            EntityKind::Organization => "organizations",
            EntityKind::Contract => "contracts",
            EntityKind::ComplianceItem => "compliance_items",
            EntityKind::BillableEvent => "billable_events",
            EntityKind::Evidence => "evidence",
            EntityKind::Comment => "comments",
            EntityKind::AuditLog => "audit_logs",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<CommentParent> for EntityKind {
    fn from(parent: CommentParent) -> Self {
        match parent {
            CommentParent::ComplianceItem => EntityKind::ComplianceItem,
            CommentParent::Evidence => EntityKind::Evidence,
            CommentParent::Organization => EntityKind::Organization,
        }
    }
}

/// A foreign key carried by a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub field: &'static str,
    pub kind: EntityKind,
    pub id: Uuid,
}

impl Reference {
    fn new(field: &'static str, kind: EntityKind, id: Uuid) -> Self {
        Self { field, kind, id }
    }

    fn optional(field: &'static str, kind: EntityKind, id: Option<Uuid>) -> Option<Self> {
        id.map(|id| Self::new(field, kind, id))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    User(User),
    Organization(Organization),
    Contract(Contract),
    ComplianceItem(ComplianceItem),
    BillableEvent(BillableEvent),
    Evidence(Evidence),
    Comment(Comment),
    AuditLog(AuditLog),
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Record::User(_) => EntityKind::User,
            Record::Organization(_) => EntityKind::Organization,
            Record::Contract(_) => EntityKind::Contract,
            Record::ComplianceItem(_) => EntityKind::ComplianceItem,
            Record::BillableEvent(_) => EntityKind::BillableEvent,
            Record::Evidence(_) => EntityKind::Evidence,
            Record::Comment(_) => EntityKind::Comment,
            Record::AuditLog(_) => EntityKind::AuditLog,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Record::User(r) => r.id,
            Record::Organization(r) => r.id,
            Record::Contract(r) => r.id,
            Record::ComplianceItem(r) => r.id,
            Record::BillableEvent(r) => r.id,
            Record::Evidence(r) => r.id,
            Record::Comment(r) => r.id,
            Record::AuditLog(r) => r.id,
        }
    }

    pub fn references(&self) -> Vec<Reference> {
        use EntityKind as K;
        match self {
            Record::User(_) | Record::Organization(_) => Vec::new(),
            Record::Contract(r) => vec![Reference::new("organizationId", K::Organization, r.organization_id)],
            Record::ComplianceItem(r) => std::iter::once(Reference::new(
                "organizationId",
                K::Organization,
                r.organization_id,
            ))
            .chain(Reference::optional("contractId", K::Contract, r.contract_id))
            .collect(),
            Record::BillableEvent(r) => std::iter::once(Reference::new(
                "organizationId",
                K::Organization,
                r.organization_id,
            ))
            .chain(Reference::optional("contractId", K::Contract, r.contract_id))
            .chain(Reference::optional(
                "complianceItemId",
                K::ComplianceItem,
                r.compliance_item_id,
            ))
            .collect(),
            Record::Evidence(r) => [
                Reference::optional("complianceItemId", K::ComplianceItem, r.compliance_item_id),
                Reference::optional("billableEventId", K::BillableEvent, r.billable_event_id),
                Reference::optional("contractId", K::Contract, r.contract_id),
            ]
            .into_iter()
            .flatten()
            .collect(),
            Record::Comment(r) => vec![
                Reference::new("userId", K::User, r.user_id),
                Reference::new("parentId", r.parent_type.into(), r.parent_id),
            ],
            Record::AuditLog(r) => Reference::optional("userId", K::User, r.user_id)
                .into_iter()
                .collect(),
        }
    }

    /// A field value the destination columns cannot hold.
    pub fn invalid_value(&self) -> Option<RecordIssue> {
        match self {
            Record::BillableEvent(r) if r.checked_total().is_none() => {
                Some(RecordIssue::InvalidValue {
                    field: "total",
                    reason: format!("{} × {} overflows", r.rate, r.units),
                })
            }
            Record::AuditLog(r) => r
                .ip_address
                .as_deref()
                .filter(|ip| !is_inet(ip))
                .map(|ip| RecordIssue::InvalidValue {
                    field: "ipAddress",
                    reason: format!("{:?} is not an IP address", ip),
                }),
            _ => None,
        }
    }
}

/// Address with an optional prefix length, as an `INET` column accepts it.
fn is_inet(value: &str) -> bool {
    let (addr, prefix) = match value.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (value, None),
    };
    let Ok(addr) = addr.parse::<IpAddr>() else {
        return false;
    };
    let max = if addr.is_ipv4() { 32 } else { 128 };
    prefix.map_or(true, |p| p.parse::<u8>().is_ok_and(|p| p <= max))
}

impl Snapshot {
    /// Flattens the snapshot into records grouped in [`EntityKind::INSERT_ORDER`],
    /// keeping the input order within each group.
    pub fn into_records(self) -> Vec<Record> {
        let mut records = Vec::with_capacity(self.len());
        records.extend(self.users.into_iter().map(Record::User));
        records.extend(self.organizations.into_iter().map(Record::Organization));
        records.extend(self.contracts.into_iter().map(Record::Contract));
        records.extend(self.compliance_items.into_iter().map(Record::ComplianceItem));
        records.extend(self.billable_events.into_iter().map(Record::BillableEvent));
        records.extend(self.evidence.into_iter().map(Record::Evidence));
        records.extend(self.comments.into_iter().map(Record::Comment));
        records.extend(self.audit_logs.into_iter().map(Record::AuditLog));
        records
    }
}
