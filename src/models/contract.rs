use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    /// `None` for open-ended contracts.
    pub end_date: Option<NaiveDate>,
    pub max_amount: Option<Decimal>,
    pub is_active: bool,
    pub file_path: Option<String>,
    pub created_at: DateTime<Utc>,
}
