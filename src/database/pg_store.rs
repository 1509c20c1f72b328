use std::collections::HashSet;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{postgres::PgQueryResult, PgPool};
use uuid::Uuid;

use super::store::{InsertOutcome, RecordStore};
use crate::bundle::{EntityKind, Record, Snapshot};
use crate::error::Result;
use crate::models::{
    audit_log::AuditLog, billable_event::BillableEvent, comment::Comment,
    compliance_item::ComplianceItem, contract::Contract, evidence::Evidence,
    organization::Organization, user::User,
};

#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_user(&self, user: &User) -> std::result::Result<PgQueryResult, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, password_hash, role, full_name, email, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(user.password_hash.as_deref())
        .bind(user.role.as_str())
        .bind(user.full_name.as_deref())
        .bind(user.email.as_deref())
        .bind(user.created_at)
        .execute(&self.pool)
        .await
    }

    async fn insert_organization(
        &self,
        org: &Organization,
    ) -> std::result::Result<PgQueryResult, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO organizations (id, name, code, org_type, contact_email, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(org.id)
        .bind(&org.name)
        .bind(&org.code)
        .bind(org.org_type.as_str())
        .bind(org.contact_email.as_deref())
        .bind(org.is_active)
        .bind(org.created_at)
        .execute(&self.pool)
        .await
    }

    async fn insert_contract(
        &self,
        contract: &Contract,
    ) -> std::result::Result<PgQueryResult, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO contracts (
                id, organization_id, title, description, start_date, end_date,
                max_amount, is_active, file_path, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(contract.id)
        .bind(contract.organization_id)
        .bind(&contract.title)
        .bind(contract.description.as_deref())
        .bind(contract.start_date)
        .bind(contract.end_date)
        .bind(contract.max_amount)
        .bind(contract.is_active)
        .bind(contract.file_path.as_deref())
        .bind(contract.created_at)
        .execute(&self.pool)
        .await
    }

    async fn insert_compliance_item(
        &self,
        item: &ComplianceItem,
    ) -> std::result::Result<PgQueryResult, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO compliance_items (
                id, organization_id, contract_id, category, item_type, commitment,
                description, responsible_party, due_date, status, completed_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(item.id)
        .bind(item.organization_id)
        .bind(item.contract_id)
        .bind(item.category.as_str())
        .bind(&item.item_type)
        .bind(&item.commitment)
        .bind(item.description.as_deref())
        .bind(item.responsible_party.as_deref())
        .bind(item.due_date)
        .bind(item.status.as_str())
        .bind(item.completed_at)
        .bind(item.created_at)
        .execute(&self.pool)
        .await
    }

    async fn insert_billable_event(
        &self,
        event: &BillableEvent,
        total: Decimal,
    ) -> std::result::Result<PgQueryResult, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO billable_events (
                id, organization_id, contract_id, compliance_item_id, description,
                rate, units, total, billing_date, invoice_number, is_paid, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(event.id)
        .bind(event.organization_id)
        .bind(event.contract_id)
        .bind(event.compliance_item_id)
        .bind(&event.description)
        .bind(event.rate)
        .bind(event.units)
        .bind(total)
        .bind(event.billing_date)
        .bind(event.invoice_number.as_deref())
        .bind(event.is_paid)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
    }

    async fn insert_evidence(
        &self,
        evidence: &Evidence,
    ) -> std::result::Result<PgQueryResult, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO evidence (
                id, title, description, evidence_type, file_path, original_filename,
                compliance_item_id, billable_event_id, contract_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(evidence.id)
        .bind(&evidence.title)
        .bind(evidence.description.as_deref())
        .bind(evidence.evidence_type.as_str())
        .bind(evidence.file_path.as_deref())
        .bind(evidence.original_filename.as_deref())
        .bind(evidence.compliance_item_id)
        .bind(evidence.billable_event_id)
        .bind(evidence.contract_id)
        .bind(evidence.created_at)
        .execute(&self.pool)
        .await
    }

    async fn insert_comment(
        &self,
        comment: &Comment,
    ) -> std::result::Result<PgQueryResult, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO comments (id, parent_type, parent_id, user_id, body, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(comment.id)
        .bind(comment.parent_type.as_str())
        .bind(comment.parent_id)
        .bind(comment.user_id)
        .bind(&comment.body)
        .bind(comment.created_at)
        .execute(&self.pool)
        .await
    }

    async fn insert_audit_log(
        &self,
        log: &AuditLog,
    ) -> std::result::Result<PgQueryResult, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, user_id, action, entity_type, entity_id, details, ip_address, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7::inet, $8)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(log.id)
        .bind(log.user_id)
        .bind(log.action.as_str())
        .bind(&log.entity_type)
        .bind(log.entity_id)
        .bind(&log.details)
        .bind(log.ip_address.as_deref())
        .bind(log.created_at)
        .execute(&self.pool)
        .await
    }
}

/// SQLSTATE classes caused by the row itself: 22 (data exception) and
/// 23 (integrity constraint violation).
fn rejects_row(sqlstate: &str) -> bool {
    sqlstate.starts_with("22") || sqlstate.starts_with("23")
}

/// Folds row-level failures into [`InsertOutcome`]; anything else is a store failure.
fn classify(result: std::result::Result<PgQueryResult, sqlx::Error>) -> Result<InsertOutcome> {
    match result {
        Ok(done) if done.rows_affected() == 0 => Ok(InsertOutcome::AlreadyExists),
        Ok(_) => Ok(InsertOutcome::Inserted),
        Err(sqlx::Error::Database(db)) if db.code().is_some_and(|code| rejects_row(&code)) => {
            Ok(InsertOutcome::Violated(db.message().to_string()))
        }
        Err(err) => Err(err.into()),
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn snapshot(&self) -> Result<Snapshot> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, role, full_name, email, created_at
            FROM users
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let organizations = sqlx::query_as::<_, Organization>(
            r#"
            SELECT id, name, code, org_type, contact_email, is_active, created_at
            FROM organizations
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let contracts = sqlx::query_as::<_, Contract>(
            r#"
            SELECT id, organization_id, title, description, start_date, end_date,
                   max_amount, is_active, file_path, created_at
            FROM contracts
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let compliance_items = sqlx::query_as::<_, ComplianceItem>(
            r#"
            SELECT id, organization_id, contract_id, category, item_type, commitment,
                   description, responsible_party, due_date, status, completed_at, created_at
            FROM compliance_items
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let billable_events = sqlx::query_as::<_, BillableEvent>(
            r#"
            SELECT id, organization_id, contract_id, compliance_item_id, description,
                   rate, units, total, billing_date, invoice_number, is_paid, created_at
            FROM billable_events
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let evidence = sqlx::query_as::<_, Evidence>(
            r#"
            SELECT id, title, description, evidence_type, file_path, original_filename,
                   compliance_item_id, billable_event_id, contract_id, created_at
            FROM evidence
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, parent_type, parent_id, user_id, body, created_at
            FROM comments
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let audit_logs = sqlx::query_as::<_, AuditLog>(
            r#"
            SELECT id, user_id, action, entity_type, entity_id, details,
                   host(ip_address) AS ip_address, created_at
            FROM audit_logs
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(Snapshot {
            users,
            organizations,
            contracts,
            compliance_items,
            billable_events,
            evidence,
            comments,
            audit_logs,
        })
    }

    async fn existing_ids(&self, kind: EntityKind, ids: &[Uuid]) -> Result<HashSet<Uuid>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let sql = format!("SELECT id FROM {} WHERE id = ANY($1)", kind.table());
        let found = sqlx::query_scalar::<_, Uuid>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(found.into_iter().collect())
    }

    async fn insert(&self, record: &Record) -> Result<InsertOutcome> {
        let result = match record {
            Record::User(r) => self.insert_user(r).await,
            Record::Organization(r) => self.insert_organization(r).await,
            Record::Contract(r) => self.insert_contract(r).await,
            Record::ComplianceItem(r) => self.insert_compliance_item(r).await,
            Record::BillableEvent(r) => match r.checked_total() {
                Some(total) => self.insert_billable_event(r, total).await,
                None => return Ok(InsertOutcome::Violated("total overflows".to_string())),
            },
            Record::Evidence(r) => self.insert_evidence(r).await,
            Record::Comment(r) => self.insert_comment(r).await,
            Record::AuditLog(r) => self.insert_audit_log(r).await,
        };
        classify(result)
    }

    async fn clear_evidence_file(&self, evidence_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE evidence
            SET file_path = NULL, original_filename = NULL
            WHERE id = $1
            "#,
        )
        .bind(evidence_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_organization(&self, name_or_code: &str) -> Result<Option<Organization>> {
        let org = sqlx::query_as::<_, Organization>(
            r#"
            SELECT id, name, code, org_type, contact_email, is_active, created_at
            FROM organizations
            WHERE LOWER(name) = LOWER($1) OR LOWER(code) = LOWER($1)
            ORDER BY (LOWER(code) = LOWER($1)) DESC, created_at
            LIMIT 1
            "#,
        )
        .bind(name_or_code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(org)
    }
}
