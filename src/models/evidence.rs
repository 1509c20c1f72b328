use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

string_enum! {
    EvidenceType, "evidence type" {
        Document => "document",
        Email => "email",
        Screenshot => "screenshot",
        Report => "report",
        ContractAndAmendment => "contract_and_amendment",
        Other => "other",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[sqlx(try_from = "String")]
    pub evidence_type: EvidenceType,
    pub file_path: Option<String>,
    pub original_filename: Option<String>,
    pub compliance_item_id: Option<Uuid>,
    pub billable_event_id: Option<Uuid>,
    pub contract_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Evidence {
    /// Name to present for the attached file, falling back to the last path segment.
    pub fn display_filename(&self) -> Option<String> {
        self.original_filename.clone().or_else(|| {
            self.file_path
                .as_deref()
                .and_then(|p| std::path::Path::new(p).file_name())
                .map(|n| n.to_string_lossy().into_owned())
        })
    }

    pub fn detach_file(&mut self) {
        self.file_path = None;
        self.original_filename = None;
    }
}
