pub mod app_config;
pub mod archive;
pub mod database;
pub mod jobcomp;
pub mod observability;

// Re-export main types for easier imports
pub use app_config::AppConfig;
pub use archive::ArchiveConfig;
pub use database::DatabaseConfig;
pub use jobcomp::JobCompConfig;
pub use observability::ObservabilityConfig;
