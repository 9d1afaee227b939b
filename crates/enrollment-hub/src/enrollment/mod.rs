//! Enrollment lifecycle: the merge rule, the request-side intake, the
//! queue-driven finalizer, and administrative queries.

pub mod admin;
pub mod domain;
pub mod finalize;
pub mod intake;
pub mod router;

#[cfg(test)]
mod tests;

pub use admin::EnrollmentAdmin;
pub use domain::{
    merge, Enrollment, EnrollmentError, EnrollmentFields, EnrollmentStatus, MergeOutcome,
};
pub use finalize::{FinalizeError, FinalizeOutcome, Finalizer};
pub use intake::{IntakeError, IntakeService};
pub use router::{enrollment_router, EnrollmentApi, EnrollmentRequest};
