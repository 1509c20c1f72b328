use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use csv::{ReaderBuilder, StringRecord, Trim, Writer};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::bundle::{EntityKind, ImportSummary, Record};
use crate::database::{InsertOutcome, RecordStore};
use crate::error::{Error, Result};
use crate::models::compliance_item::{ComplianceCategory, ComplianceItem, ComplianceStatus};
use crate::models::organization::Organization;
use crate::models::UnknownVariant;

pub const CSV_HEADERS: [&str; 8] = [
    "Category",
    "Type",
    "Commitment",
    "Description",
    "Responsible Party",
    "Status",
    "Due Date",
    "Customer",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowError {
    #[error("row could not be decoded: {0}")]
    Undecodable(String),
    #[error("missing {0}")]
    MissingField(&'static str),
    #[error(transparent)]
    UnknownValue(#[from] UnknownVariant),
    #[error("unparseable due date {0:?}")]
    BadDueDate(String),
    #[error("invalid row: {0}")]
    Invalid(String),
}

/// A validated CSV row, not yet bound to an organization.
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct ComplianceItemDraft {
    pub category: ComplianceCategory,
    #[validate(length(min = 1, max = 100))]
    pub item_type: String,
    #[validate(length(min = 1, max = 2000))]
    pub commitment: String,
    pub description: Option<String>,
    #[validate(length(max = 255))]
    pub responsible_party: Option<String>,
    pub status: ComplianceStatus,
    pub due_date: Option<NaiveDate>,
    pub customer: Option<String>,
}

impl ComplianceItemDraft {
    pub fn into_item(self, organization_id: Uuid) -> ComplianceItem {
        let now = Utc::now();
        let mut item = ComplianceItem {
            id: Uuid::new_v4(),
            organization_id,
            contract_id: None,
            category: self.category,
            item_type: self.item_type,
            commitment: self.commitment,
            description: self.description,
            responsible_party: self.responsible_party,
            due_date: self.due_date,
            status: ComplianceStatus::Pending,
            completed_at: None,
            created_at: now,
        };
        item.set_status(self.status, now);
        item
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    pub line: u64,
    pub error: RowError,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedCsv {
    pub drafts: Vec<ComplianceItemDraft>,
    pub skipped: Vec<SkippedRow>,
}

struct Columns {
    category: usize,
    item_type: usize,
    commitment: usize,
    description: Option<usize>,
    responsible_party: Option<usize>,
    status: Option<usize>,
    due_date: Option<usize>,
    customer: Option<usize>,
}

impl Columns {
    fn locate(headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers.iter().position(|h| {
                h.trim_start_matches('\u{feff}')
                    .trim()
                    .eq_ignore_ascii_case(name)
            })
        };
        let required = |name: &str| {
            find(name).ok_or_else(|| Error::BadRequest(format!("CSV is missing the {} column", name)))
        };

        Ok(Self {
            category: required("Category")?,
            item_type: required("Type")?,
            commitment: required("Commitment")?,
            description: find("Description"),
            responsible_party: find("Responsible Party"),
            status: find("Status"),
            due_date: find("Due Date"),
            customer: find("Customer"),
        })
    }
}

fn cell(record: &StringRecord, index: Option<usize>) -> Option<String> {
    index
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_category(raw: &str) -> std::result::Result<ComplianceCategory, RowError> {
    Ok(raw.to_ascii_lowercase().parse::<ComplianceCategory>()?)
}

fn parse_status(raw: Option<&str>) -> std::result::Result<ComplianceStatus, RowError> {
    let Some(raw) = raw else {
        return Ok(ComplianceStatus::Pending);
    };
    let normalized = match raw.to_ascii_lowercase().as_str() {
        "completed" | "done" => "complete".to_string(),
        "n/a" | "not applicable" => "na".to_string(),
        other => other.to_string(),
    };
    Ok(normalized.parse::<ComplianceStatus>()?)
}

fn parse_due_date(raw: &str) -> std::result::Result<NaiveDate, RowError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .map_err(|_| RowError::BadDueDate(raw.to_string()))
}

fn parse_row(columns: &Columns, record: &StringRecord) -> std::result::Result<ComplianceItemDraft, RowError> {
    let category = cell(record, Some(columns.category)).ok_or(RowError::MissingField("Category"))?;
    let item_type = cell(record, Some(columns.item_type)).ok_or(RowError::MissingField("Type"))?;
    let commitment =
        cell(record, Some(columns.commitment)).ok_or(RowError::MissingField("Commitment"))?;

    let draft = ComplianceItemDraft {
        category: parse_category(&category)?,
        item_type,
        commitment,
        description: cell(record, columns.description),
        responsible_party: cell(record, columns.responsible_party),
        status: parse_status(cell(record, columns.status).as_deref())?,
        due_date: cell(record, columns.due_date)
            .map(|raw| parse_due_date(&raw))
            .transpose()?,
        customer: cell(record, columns.customer),
    };
    draft
        .validate()
        .map_err(|e| RowError::Invalid(e.to_string()))?;
    Ok(draft)
}

/// Splits a CSV upload into valid drafts and skipped rows. Only a missing
/// required column or an unreadable header fails the whole file.
pub fn parse_compliance_csv(bytes: &[u8]) -> Result<ParsedCsv> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(bytes);
    let columns = Columns::locate(reader.headers()?)?;

    let mut parsed = ParsedCsv::default();
    for (index, result) in reader.records().enumerate() {
        let fallback_line = index as u64 + 2;
        let outcome = match result {
            Ok(record) => {
                let line = record.position().map_or(fallback_line, |p| p.line());
                parse_row(&columns, &record).map_err(|error| SkippedRow { line, error })
            }
            Err(err) => Err(SkippedRow {
                line: err.position().map_or(fallback_line, |p| p.line()),
                error: RowError::Undecodable(err.to_string()),
            }),
        };
        match outcome {
            Ok(draft) => parsed.drafts.push(draft),
            Err(skipped) => parsed.skipped.push(skipped),
        }
    }
    Ok(parsed)
}

#[derive(Clone)]
pub struct CsvService {
    store: Arc<dyn RecordStore>,
    default_organization_code: String,
}

impl CsvService {
    pub fn new(store: Arc<dyn RecordStore>, default_organization_code: impl Into<String>) -> Self {
        Self {
            store,
            default_organization_code: default_organization_code.into(),
        }
    }

    pub async fn import_compliance_items(&self, bytes: &[u8]) -> Result<ImportSummary> {
        let parsed = parse_compliance_csv(bytes)?;
        let mut summary = ImportSummary::default();
        for skipped in &parsed.skipped {
            warn!(line = skipped.line, error = %skipped.error, "CSV row skipped");
            summary.record_failed(EntityKind::ComplianceItem);
        }

        let mut customers: HashMap<String, Uuid> = HashMap::new();
        let mut fallback: Option<Uuid> = None;
        for draft in parsed.drafts {
            let organization_id = match draft.customer.as_deref() {
                Some(name) => match customers.get(&name.to_lowercase()) {
                    Some(id) => Some(*id),
                    None => {
                        let found = self.store.find_organization(name).await?.map(|o| o.id);
                        if let Some(id) = found {
                            customers.insert(name.to_lowercase(), id);
                        }
                        found
                    }
                },
                None => None,
            };
            let organization_id = match (organization_id, fallback) {
                (Some(id), _) | (None, Some(id)) => id,
                (None, None) => {
                    if let Some(customer) = draft.customer.as_deref() {
                        warn!(customer, "unknown customer, using the default organization");
                    }
                    let id = self.default_organization(&mut summary).await?;
                    fallback = Some(id);
                    id
                }
            };

            let item = draft.into_item(organization_id);
            match self.store.insert(&Record::ComplianceItem(item)).await? {
                InsertOutcome::Inserted => summary.record_inserted(EntityKind::ComplianceItem),
                InsertOutcome::AlreadyExists => summary.record_skipped(EntityKind::ComplianceItem),
                InsertOutcome::Violated(message) => {
                    warn!(%message, "CSV row rejected by the database");
                    summary.record_failed(EntityKind::ComplianceItem);
                }
            }
        }

        info!(
            imported = summary.imported.compliance_items,
            errors = summary.errors.compliance_items,
            "compliance CSV imported"
        );
        Ok(summary)
    }

    /// Finds the default organization, creating it on first use.
    async fn default_organization(&self, summary: &mut ImportSummary) -> Result<Uuid> {
        let code = self.default_organization_code.as_str();
        if let Some(org) = self.store.find_organization(code).await? {
            return Ok(org.id);
        }

        let org = Organization::fallback(code, Utc::now());
        match self.store.insert(&Record::Organization(org.clone())).await? {
            InsertOutcome::Inserted => {
                info!(code, "created default organization");
                summary.record_inserted(EntityKind::Organization);
                Ok(org.id)
            }
            // Lost a race with a concurrent import.
            InsertOutcome::AlreadyExists | InsertOutcome::Violated(_) => self
                .store
                .find_organization(code)
                .await?
                .map(|o| o.id)
                .ok_or_else(|| Error::Internal("Default organization could not be created".into())),
        }
    }

    /// Every compliance item in the import column layout.
    pub async fn export_compliance_items(&self) -> Result<Vec<u8>> {
        let snapshot = self.store.snapshot().await?;
        let names: HashMap<Uuid, &str> = snapshot
            .organizations
            .iter()
            .map(|o| (o.id, o.name.as_str()))
            .collect();

        let mut writer = Writer::from_writer(Vec::new());
        writer.write_record(CSV_HEADERS)?;
        for item in &snapshot.compliance_items {
            let due_date = item
                .due_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            writer.write_record([
                item.category.as_str(),
                item.item_type.as_str(),
                item.commitment.as_str(),
                item.description.as_deref().unwrap_or_default(),
                item.responsible_party.as_deref().unwrap_or_default(),
                item.status.as_str(),
                due_date.as_str(),
                names.get(&item.organization_id).copied().unwrap_or_default(),
            ])?;
        }
        writer
            .into_inner()
            .map_err(|e| Error::Internal(format!("CSV write failed: {}", e)))
    }
}
