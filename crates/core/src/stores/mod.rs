pub(crate) mod schema;
pub mod sqlite;

pub use sqlite::SqliteRecordStore;
