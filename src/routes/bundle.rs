use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use bytes::Bytes;
use chrono::Utc;
use serde_json::{json, Value as JsonValue};
use tracing::warn;
use uuid::Uuid;

use crate::{
    bundle::ImportSummary,
    error::{Error, Result},
    middleware::auth::Claims,
    models::audit_log::AuditAction,
    AppState,
};

type ClientAddr = Option<ConnectInfo<SocketAddr>>;

/// Bytes of the multipart field named `file`.
async fn read_upload(mut multipart: Multipart) -> Result<Bytes> {
    while let Some(field) = multipart.next_field().await.map_err(Error::Multipart)? {
        if field.name() == Some("file") {
            let data = field.bytes().await.map_err(Error::Multipart)?;
            if data.is_empty() {
                return Err(Error::BadRequest("Uploaded file is empty".to_string()));
            }
            return Ok(data);
        }
    }
    Err(Error::BadRequest("Missing multipart field \"file\"".to_string()))
}

fn attachment(content_type: &'static str, filename: String, body: Vec<u8>) -> impl IntoResponse {
    let disposition = format!("attachment; filename=\"{}\"", filename);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
}

/// Audit failures never fail the request they describe.
async fn audit(
    state: &AppState,
    claims: &Claims,
    client: ClientAddr,
    action: AuditAction,
    entity_type: &str,
    details: JsonValue,
) {
    let ip = client.map(|ConnectInfo(addr)| addr.ip().to_string());
    if let Err(err) = state
        .audit_service
        .log(claims.user_id(), action, entity_type, Uuid::new_v4(), Some(details), ip)
        .await
    {
        warn!(error = %err, action = %action, "audit log not written");
    }
}

fn summary_details(summary: &ImportSummary) -> JsonValue {
    serde_json::to_value(summary).unwrap_or(JsonValue::Null)
}

fn stamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

#[utoipa::path(
    get,
    path = "/api/export/database",
    responses(
        (status = 200, description = "JSON manifest with every record, no password hashes or files"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Not an admin")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn export_database(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    client: ClientAddr,
) -> Result<impl IntoResponse> {
    let output = state.export_service.export_database().await?;
    audit(
        &state,
        &claims,
        client,
        AuditAction::Export,
        "database_bundle",
        json!({ "scope": "database", "records": output.records }),
    )
    .await;

    Ok(attachment(
        "application/json",
        format!("compliance_database_{}.json", stamp()),
        output.bytes,
    ))
}

#[utoipa::path(
    get,
    path = "/api/export/unified",
    responses(
        (status = 200, description = "ZIP archive with the manifest and evidence files"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Not an admin")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn export_unified(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    client: ClientAddr,
) -> Result<impl IntoResponse> {
    let output = state.export_service.export_unified().await?;
    audit(
        &state,
        &claims,
        client,
        AuditAction::Export,
        "unified_bundle",
        json!({
            "scope": "unified",
            "records": output.records,
            "files": output.files,
            "missingFiles": output.missing_files,
        }),
    )
    .await;

    Ok(attachment(
        "application/zip",
        format!("compliance_unified_{}.zip", stamp()),
        output.bytes,
    ))
}

#[utoipa::path(
    get,
    path = "/api/export/compliance-items.csv",
    responses(
        (status = 200, description = "Compliance items in the CSV import layout"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Not an admin")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn export_compliance_csv(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    client: ClientAddr,
) -> Result<impl IntoResponse> {
    let body = state.csv_service.export_compliance_items().await?;
    audit(
        &state,
        &claims,
        client,
        AuditAction::Export,
        "compliance_items_csv",
        json!({ "bytes": body.len() }),
    )
    .await;

    Ok(attachment(
        "text/csv; charset=utf-8",
        format!("compliance_items_{}.csv", stamp()),
        body,
    ))
}

#[utoipa::path(
    post,
    path = "/api/import/database",
    responses(
        (status = 200, description = "Import summary", body = ImportSummary),
        (status = 400, description = "Missing upload"),
        (status = 422, description = "Manifest unreadable; nothing imported")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn import_database(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    client: ClientAddr,
    multipart: Multipart,
) -> Result<Json<ImportSummary>> {
    let upload = read_upload(multipart).await?;
    let summary = state.import_service.import_database(&upload).await?;
    audit(
        &state,
        &claims,
        client,
        AuditAction::Import,
        "database_bundle",
        summary_details(&summary),
    )
    .await;
    Ok(Json(summary))
}

#[utoipa::path(
    post,
    path = "/api/import/unified",
    responses(
        (status = 200, description = "Import summary", body = ImportSummary),
        (status = 400, description = "Missing upload"),
        (status = 422, description = "Archive corrupt; nothing imported")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn import_unified(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    client: ClientAddr,
    multipart: Multipart,
) -> Result<Json<ImportSummary>> {
    let upload = read_upload(multipart).await?;
    let summary = state.import_service.import_unified(&upload).await?;
    audit(
        &state,
        &claims,
        client,
        AuditAction::Import,
        "unified_bundle",
        summary_details(&summary),
    )
    .await;
    Ok(Json(summary))
}

#[utoipa::path(
    post,
    path = "/api/compliance-items/import-csv",
    responses(
        (status = 200, description = "Import summary", body = ImportSummary),
        (status = 400, description = "Missing upload or required column")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn import_compliance_csv(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    client: ClientAddr,
    multipart: Multipart,
) -> Result<Json<ImportSummary>> {
    let upload = read_upload(multipart).await?;
    let summary = state.csv_service.import_compliance_items(&upload).await?;
    audit(
        &state,
        &claims,
        client,
        AuditAction::Import,
        "compliance_items_csv",
        summary_details(&summary),
    )
    .await;
    Ok(Json(summary))
}
