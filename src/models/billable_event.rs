use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BillableEvent {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub contract_id: Option<Uuid>,
    pub compliance_item_id: Option<Uuid>,
    pub description: String,
    pub rate: Decimal,
    pub units: Decimal,
    pub total: Decimal,
    pub billing_date: NaiveDate,
    pub invoice_number: Option<String>,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
}

impl BillableEvent {
    /// `rate × units`, or `None` when the product does not fit a `Decimal`.
    pub fn checked_total(&self) -> Option<Decimal> {
        self.rate.checked_mul(self.units)
    }
}
