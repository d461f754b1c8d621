pub mod mapping;
pub mod sqlite;
pub mod store;

pub use sqlite::{JobCompQueryBuilder, SchemaManager, SqliteArchiver, SqliteHistoryQuery};
pub use store::{derive_database_name, JobCompStore, StoreOptions, StoreStatus, DEFAULT_DATABASE_NAME};
