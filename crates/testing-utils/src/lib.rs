//! # Job Completion Testing Utils
//!
//! Shared testing utilities for the job completion store workspace:
//!
//! - **Mock identity service**: in-memory user/group tables that count lookups
//! - **Test data builders**: `JobRecordBuilder` with sensible defaults
//! - **Helpers**: unique names and test log setup
//!
//! ```rust
//! use jobcomp_testing_utils::{JobRecordBuilder, MockIdentityService};
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
