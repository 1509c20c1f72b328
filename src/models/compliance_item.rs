use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

string_enum! {
    ComplianceCategory, "compliance category" {
        Contractual => "contractual",
        Regulatory => "regulatory",
        Financial => "financial",
        Reporting => "reporting",
        Security => "security",
        Privacy => "privacy",
        Operational => "operational",
        Other => "other",
    }
}

string_enum! {
    ComplianceStatus, "compliance status" {
        Pending => "pending",
        Complete => "complete",
        Overdue => "overdue",
        NotApplicable => "na",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceItem {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub contract_id: Option<Uuid>,
    #[sqlx(try_from = "String")]
    pub category: ComplianceCategory,
    #[serde(rename = "type")]
    pub item_type: String,
    pub commitment: String,
    pub description: Option<String>,
    pub responsible_party: Option<String>,
    pub due_date: Option<NaiveDate>,
    #[sqlx(try_from = "String")]
    pub status: ComplianceStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ComplianceItem {
    /// Moves the item to `status`, stamping `completed_at` on the transition
    /// into `complete` and clearing it on the way out.
    pub fn set_status(&mut self, status: ComplianceStatus, now: DateTime<Utc>) {
        match status {
            ComplianceStatus::Complete if self.status != ComplianceStatus::Complete => {
                self.completed_at = Some(now);
            }
            ComplianceStatus::Complete => {
                self.completed_at.get_or_insert(now);
            }
            _ => self.completed_at = None,
        }
        self.status = status;
    }
}
