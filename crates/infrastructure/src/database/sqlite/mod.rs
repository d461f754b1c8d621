pub mod archiver;
pub mod history_query;
pub mod query_builder;
pub mod schema_manager;

pub use archiver::SqliteArchiver;
pub use history_query::SqliteHistoryQuery;
pub use query_builder::JobCompQueryBuilder;
pub use schema_manager::SchemaManager;
