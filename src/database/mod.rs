pub mod pg_store;
pub mod pool;
pub mod store;

pub use pg_store::PgRecordStore;
pub use store::{InsertOutcome, RecordStore};
