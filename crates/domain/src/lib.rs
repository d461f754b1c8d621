pub mod entities;
pub mod ports;
pub mod query;
pub mod repositories;
pub mod schema;
pub mod topology;
pub mod value_objects;

pub use entities::*;
pub use jobcomp_errors::{describe, ErrorCode, JobCompError, JobCompResult};
pub use ports::*;
pub use query::*;
pub use repositories::*;
pub use schema::*;
pub use topology::*;
pub use value_objects::*;
