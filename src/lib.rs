pub mod bundle;
pub mod config;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::config::Config;
use crate::database::{PgRecordStore, RecordStore};
use crate::services::{
    audit_service::AuditService,
    csv_service::CsvService,
    export_service::ExportService,
    import_service::ImportService,
    storage_service::{FileStorage, LocalFileStorage},
};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub export_service: ExportService,
    pub import_service: ImportService,
    pub csv_service: CsvService,
    pub audit_service: AuditService,
}

impl AppState {
    pub fn new(pool: PgPool, config: &Config) -> Self {
        let store: Arc<dyn RecordStore> = Arc::new(PgRecordStore::new(pool.clone()));
        let storage: Arc<dyn FileStorage> = Arc::new(LocalFileStorage::new(&config.uploads_dir));

        Self {
            export_service: ExportService::new(store.clone(), storage.clone()),
            import_service: ImportService::new(store.clone(), storage),
            csv_service: CsvService::new(store, config.default_organization_code.clone()),
            audit_service: AuditService::new(pool.clone()),
            pool,
        }
    }
}
