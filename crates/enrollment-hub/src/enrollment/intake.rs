use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::domain::{Enrollment, EnrollmentError, EnrollmentFields, EnrollmentStatus, MergeOutcome};
use crate::messaging::{EnrollmentPayload, EnrollmentPublisher, PublishError};
use crate::store::{self, AgeGroupRepository, EnrollmentRepository, RepositoryError};

/// Request-side use case: resolve the bracket, screen against the stored
/// record, and hand a PENDING candidate to the queue. Never writes records.
pub struct IntakeService<G, E, P> {
    groups: Arc<G>,
    enrollments: Arc<E>,
    publisher: Arc<P>,
}

impl<G, E, P> Clone for IntakeService<G, E, P> {
    fn clone(&self) -> Self {
        Self {
            groups: Arc::clone(&self.groups),
            enrollments: Arc::clone(&self.enrollments),
            publisher: Arc::clone(&self.publisher),
        }
    }
}

impl<G, E, P> IntakeService<G, E, P>
where
    G: AgeGroupRepository + 'static,
    E: EnrollmentRepository + 'static,
    P: EnrollmentPublisher + 'static,
{
    pub fn new(groups: Arc<G>, enrollments: Arc<E>, publisher: Arc<P>) -> Self {
        Self {
            groups,
            enrollments,
            publisher,
        }
    }

    /// Build the queue payload for a request without publishing it.
    pub fn submit(&self, name: &str, age: u32, cpf: &str) -> Result<EnrollmentPayload, IntakeError> {
        let group = self
            .groups
            .find_covering(age)?
            .ok_or(IntakeError::NoCoveringGroup { age })?;

        let existing = self.enrollments.find_by_cpf(cpf)?;
        if existing.as_ref().is_some_and(Enrollment::is_approved) {
            return Err(IntakeError::AlreadyApproved(cpf.to_string()));
        }

        let fields = EnrollmentFields {
            name: name.to_string(),
            age,
            cpf: cpf.to_string(),
            status: EnrollmentStatus::Pending,
            requested_at: Some(Utc::now().timestamp()),
            enrolled_at: None,
            age_group_name: Some(group.name().to_string()),
        };

        match Enrollment::create_final(fields, existing.as_ref())? {
            MergeOutcome::Changed(candidate) => {
                debug!(cpf, group = group.name(), "enrollment candidate built");
                Ok(EnrollmentPayload::from_candidate(&candidate))
            }
            MergeOutcome::Unchanged => Err(IntakeError::AlreadyApproved(cpf.to_string())),
        }
    }

    /// Submit and publish. Nothing is persisted here; the worker decides.
    pub async fn request(
        &self,
        name: &str,
        age: u32,
        cpf: &str,
    ) -> Result<EnrollmentPayload, IntakeError> {
        let screening = self.clone();
        let (owned_name, owned_cpf) = (name.to_string(), cpf.to_string());
        let payload =
            store::blocking(move || screening.submit(&owned_name, age, &owned_cpf)).await?;
        self.publisher.publish(&payload).await?;
        info!(
            cpf,
            group = payload.age_group_name.as_deref().unwrap_or_default(),
            "enrollment request queued"
        );
        Ok(payload)
    }

    pub fn status(&self, cpf: &str) -> Result<Option<Enrollment>, IntakeError> {
        Ok(self.enrollments.find_by_cpf(cpf)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("no age group covers age {age}")]
    NoCoveringGroup { age: u32 },
    #[error("enrollment for cpf '{0}' is already approved")]
    AlreadyApproved(String),
    #[error(transparent)]
    InvalidEnrollment(#[from] EnrollmentError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}
