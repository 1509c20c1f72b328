use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

string_enum! {
    OrganizationType, "organization type" {
        Customer => "customer",
        Vendor => "vendor",
        Contractor => "contractor",
        Internal => "internal",
        StateGovt => "state_govt",
        FederalGovt => "federal_govt",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    #[serde(rename = "type")]
    #[sqlx(try_from = "String")]
    pub org_type: OrganizationType,
    pub contact_email: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Organization {
    /// Catch-all owner for imported rows whose customer cannot be matched.
    pub fn fallback(code: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: "Default Organization".to_string(),
            code: code.to_string(),
            org_type: OrganizationType::Internal,
            contact_email: None,
            is_active: true,
            created_at: now,
        }
    }
}
