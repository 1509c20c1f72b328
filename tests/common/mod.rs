#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use compliance_backend::bundle::{EntityKind, Record, Snapshot};
use compliance_backend::database::{InsertOutcome, RecordStore};
use compliance_backend::error::{Error, Result};
use compliance_backend::models::{
    billable_event::BillableEvent,
    comment::{Comment, CommentParent},
    compliance_item::{ComplianceCategory, ComplianceItem, ComplianceStatus},
    contract::Contract,
    evidence::{Evidence, EvidenceType},
    organization::{Organization, OrganizationType},
    user::{User, UserRole},
};
use compliance_backend::services::storage_service::FileStorage;

/// Row store with the same key, foreign-key and uniqueness rules as the schema.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<BTreeMap<EntityKind, Vec<Record>>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.rows.lock().unwrap().get(&kind).map_or(0, Vec::len)
    }

    pub fn evidence(&self, id: Uuid) -> Option<Evidence> {
        self.rows
            .lock()
            .unwrap()
            .get(&EntityKind::Evidence)
            .into_iter()
            .flatten()
            .find_map(|r| match r {
                Record::Evidence(e) if e.id == id => Some(e.clone()),
                _ => None,
            })
    }

    pub fn compliance_items(&self) -> Vec<ComplianceItem> {
        self.rows
            .lock()
            .unwrap()
            .get(&EntityKind::ComplianceItem)
            .into_iter()
            .flatten()
            .filter_map(|r| match r {
                Record::ComplianceItem(i) => Some(i.clone()),
                _ => None,
            })
            .collect()
    }

    fn contains(rows: &BTreeMap<EntityKind, Vec<Record>>, kind: EntityKind, id: Uuid) -> bool {
        rows.get(&kind)
            .map_or(false, |records| records.iter().any(|r| r.id() == id))
    }

    fn unique_violation(rows: &BTreeMap<EntityKind, Vec<Record>>, record: &Record) -> Option<String> {
        let existing = rows.get(&record.kind())?;
        match record {
            Record::Organization(org) => existing
                .iter()
                .any(|r| matches!(r, Record::Organization(o) if o.code == org.code))
                .then(|| format!("duplicate organization code {}", org.code)),
            Record::User(user) => existing
                .iter()
                .any(|r| matches!(r, Record::User(u) if u.username == user.username))
                .then(|| format!("duplicate username {}", user.username)),
            _ => None,
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn snapshot(&self) -> Result<Snapshot> {
        let rows = self.rows.lock().unwrap();
        let mut snapshot = Snapshot::default();
        for record in rows.values().flatten().cloned() {
            match record {
                Record::User(r) => snapshot.users.push(r),
                Record::Organization(r) => snapshot.organizations.push(r),
                Record::Contract(r) => snapshot.contracts.push(r),
                Record::ComplianceItem(r) => snapshot.compliance_items.push(r),
                Record::BillableEvent(r) => snapshot.billable_events.push(r),
                Record::Evidence(r) => snapshot.evidence.push(r),
                Record::Comment(r) => snapshot.comments.push(r),
                Record::AuditLog(r) => snapshot.audit_logs.push(r),
            }
        }
        Ok(snapshot)
    }

    async fn existing_ids(&self, kind: EntityKind, ids: &[Uuid]) -> Result<HashSet<Uuid>> {
        let rows = self.rows.lock().unwrap();
        Ok(ids
            .iter()
            .copied()
            .filter(|id| Self::contains(&rows, kind, *id))
            .collect())
    }

    async fn insert(&self, record: &Record) -> Result<InsertOutcome> {
        let mut rows = self.rows.lock().unwrap();
        if Self::contains(&rows, record.kind(), record.id()) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        if let Some(reference) = record
            .references()
            .into_iter()
            .find(|r| !Self::contains(&rows, r.kind, r.id))
        {
            return Ok(InsertOutcome::Violated(format!(
                "foreign key {} -> {} {}",
                reference.field, reference.kind, reference.id
            )));
        }
        if let Some(message) = Self::unique_violation(&rows, record) {
            return Ok(InsertOutcome::Violated(message));
        }
        if let Record::User(user) = record {
            if user.password_hash.is_none() {
                return Ok(InsertOutcome::Violated("password_hash is null".into()));
            }
        }
        rows.entry(record.kind()).or_default().push(record.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn clear_evidence_file(&self, evidence_id: Uuid) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        for record in rows.entry(EntityKind::Evidence).or_default() {
            if let Record::Evidence(e) = record {
                if e.id == evidence_id {
                    e.detach_file();
                }
            }
        }
        Ok(())
    }

    async fn find_organization(&self, name_or_code: &str) -> Result<Option<Organization>> {
        let rows = self.rows.lock().unwrap();
        let orgs: Vec<&Organization> = rows
            .get(&EntityKind::Organization)
            .into_iter()
            .flatten()
            .filter_map(|r| match r {
                Record::Organization(o) => Some(o),
                _ => None,
            })
            .collect();
        let by_code = orgs
            .iter()
            .find(|o| o.code.eq_ignore_ascii_case(name_or_code));
        let by_name = orgs
            .iter()
            .find(|o| o.name.eq_ignore_ascii_case(name_or_code));
        Ok(by_code.or(by_name).map(|o| (*o).clone()))
    }
}

/// Storage whose writes always fail.
pub struct ReadOnlyStorage;

#[async_trait]
impl FileStorage for ReadOnlyStorage {
    async fn read(&self, _path: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn write(&self, path: &str, _content: &[u8]) -> Result<()> {
        Err(Error::Internal(format!("read-only storage refused {}", path)))
    }
}

pub fn organization(code: &str) -> Organization {
    Organization {
        id: Uuid::new_v4(),
        name: format!("{} Holdings", code),
        code: code.to_string(),
        org_type: OrganizationType::Customer,
        contact_email: Some(format!("ops@{}.example", code.to_lowercase())),
        is_active: true,
        created_at: Utc::now(),
    }
}

pub fn contract(organization_id: Uuid) -> Contract {
    Contract {
        id: Uuid::new_v4(),
        organization_id,
        title: "Master services agreement".into(),
        description: None,
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2026, 12, 31),
        max_amount: Some(Decimal::new(25_000_000, 2)),
        is_active: true,
        file_path: None,
        created_at: Utc::now(),
    }
}

pub fn compliance_item(organization_id: Uuid, contract_id: Option<Uuid>) -> ComplianceItem {
    ComplianceItem {
        id: Uuid::new_v4(),
        organization_id,
        contract_id,
        category: ComplianceCategory::Reporting,
        item_type: "Report".into(),
        commitment: "Deliver the monthly SLA report".into(),
        description: None,
        responsible_party: Some("PMO".into()),
        due_date: NaiveDate::from_ymd_opt(2024, 7, 1),
        status: ComplianceStatus::Pending,
        completed_at: None,
        created_at: Utc::now(),
    }
}

pub fn billable_event(organization_id: Uuid, contract_id: Option<Uuid>) -> BillableEvent {
    BillableEvent {
        id: Uuid::new_v4(),
        organization_id,
        contract_id,
        compliance_item_id: None,
        description: "Onsite audit support".into(),
        rate: Decimal::new(15000, 2),
        units: Decimal::new(8, 0),
        total: Decimal::new(120000, 2),
        billing_date: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        invoice_number: Some("INV-0042".into()),
        is_paid: false,
        created_at: Utc::now(),
    }
}

pub fn evidence(compliance_item_id: Option<Uuid>, file_path: Option<&str>) -> Evidence {
    Evidence {
        id: Uuid::new_v4(),
        title: "Signed report".into(),
        description: None,
        evidence_type: EvidenceType::Report,
        file_path: file_path.map(str::to_string),
        original_filename: file_path.map(|p| {
            std::path::Path::new(p)
                .file_name()
                .unwrap()
                .to_string_lossy()
                .into_owned()
        }),
        compliance_item_id,
        billable_event_id: None,
        contract_id: None,
        created_at: Utc::now(),
    }
}

pub fn user(username: &str, password_hash: Option<&str>) -> User {
    User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        password_hash: password_hash.map(str::to_string),
        role: UserRole::User,
        full_name: None,
        email: None,
        created_at: Utc::now(),
    }
}

pub fn comment(user_id: Uuid, parent_type: CommentParent, parent_id: Uuid) -> Comment {
    Comment {
        id: Uuid::new_v4(),
        parent_type,
        parent_id,
        user_id,
        body: "Reviewed, looks complete.".into(),
        created_at: Utc::now(),
    }
}
