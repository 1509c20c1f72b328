pub mod bundle;
pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::{bundle::EntityCounts, bundle::ImportSummary, middleware, AppState};

#[derive(OpenApi)]
#[openapi(
    paths(
        bundle::export_database,
        bundle::export_unified,
        bundle::export_compliance_csv,
        bundle::import_database,
        bundle::import_unified,
        bundle::import_compliance_csv,
    ),
    components(schemas(ImportSummary, EntityCounts))
)]
pub struct ApiDoc;

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let admin_api = Router::new()
        .route("/api/export/database", get(bundle::export_database))
        .route("/api/export/unified", get(bundle::export_unified))
        .route(
            "/api/export/compliance-items.csv",
            get(bundle::export_compliance_csv),
        )
        .route("/api/import/database", post(bundle::import_database))
        .route("/api/import/unified", post(bundle::import_unified))
        .route(
            "/api/compliance-items/import-csv",
            post(bundle::import_compliance_csv),
        )
        .route_layer(axum::middleware::from_fn(middleware::auth::require_admin))
        .layer(DefaultBodyLimit::max(max_upload_bytes));

    Router::new()
        .route("/health", get(health::health))
        .route("/api-docs/openapi.json", get(openapi))
        .merge(admin_api)
        .with_state(state)
        .layer(middleware::cors::admin_cors())
        .layer(TraceLayer::new_for_http())
}
