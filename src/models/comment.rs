use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

string_enum! {
    CommentParent, "comment parent" {
        ComplianceItem => "compliance_item",
        Evidence => "evidence",
        Organization => "organization",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    #[sqlx(try_from = "String")]
    pub parent_type: CommentParent,
    pub parent_id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "text")]
    pub body: String,
    pub created_at: DateTime<Utc>,
}
