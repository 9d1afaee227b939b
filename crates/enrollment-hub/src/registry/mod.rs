//! Named, non-overlapping age brackets.

pub mod domain;
pub mod router;
pub mod service;

pub use domain::{AgeGroup, AgeGroupError, AgeRange};
pub use router::age_group_router;
pub use service::{AgeGroupRegistry, RegistryError, SeedReport, DEFAULT_AGE_GROUPS};
