use crate::error::Result;
use crate::models::audit_log::{AuditAction, AuditLog};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct AuditService {
    pool: PgPool,
}

impl AuditService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn log(
        &self,
        user_id: Option<Uuid>,
        action: AuditAction,
        entity_type: &str,
        entity_id: Uuid,
        details: Option<JsonValue>,
        ip: Option<String>,
    ) -> Result<AuditLog> {
        let row = sqlx::query_as::<_, AuditLog>(
            r#"
            INSERT INTO audit_logs (id, user_id, action, entity_type, entity_id, details, ip_address)
            VALUES ($1, $2, $3, $4, $5, $6, $7::inet)
            RETURNING id, user_id, action, entity_type, entity_id, details,
                      host(ip_address) AS ip_address, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(action.as_str())
        .bind(entity_type)
        .bind(entity_id)
        .bind(details)
        .bind(ip)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}
