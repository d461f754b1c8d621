pub mod config;
pub mod identity;
pub mod record_builder;

pub use config::*;
pub use identity::*;
pub use record_builder::*;
