pub mod audit_service;
pub mod csv_service;
pub mod export_service;
pub mod import_service;
pub mod storage_service;
