use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use super::domain::{Enrollment, EnrollmentError, EnrollmentFields, EnrollmentStatus};
use crate::cpf;
use crate::messaging::{DeliveryDecision, DeliveryHandler, EnrollmentPayload};
use crate::store::{self, AgeGroupRepository, ApplyOutcome, EnrollmentRepository, RepositoryError};

/// What a processed message did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    Inserted(EnrollmentStatus),
    Updated(EnrollmentStatus),
    /// An approved record already existed; nothing was written.
    Skipped,
}

/// Consumer-side use case turning a queued request into a persisted decision.
pub struct Finalizer<G, E> {
    groups: Arc<G>,
    enrollments: Arc<E>,
    min_processing: Duration,
}

impl<G, E> Clone for Finalizer<G, E> {
    fn clone(&self) -> Self {
        Self {
            groups: Arc::clone(&self.groups),
            enrollments: Arc::clone(&self.enrollments),
            min_processing: self.min_processing,
        }
    }
}

impl<G, E> Finalizer<G, E>
where
    G: AgeGroupRepository + 'static,
    E: EnrollmentRepository + 'static,
{
    pub fn new(groups: Arc<G>, enrollments: Arc<E>, min_processing: Duration) -> Self {
        Self {
            groups,
            enrollments,
            min_processing,
        }
    }

    pub fn finalize(&self, payload: EnrollmentPayload) -> Result<FinalizeOutcome, FinalizeError> {
        let group_name = payload
            .age_group_name
            .filter(|name| !name.trim().is_empty());
        let group_valid = match group_name.as_deref() {
            Some(name) => self.groups.exists(name)?,
            None => false,
        };
        let cpf_valid = cpf::is_valid(&payload.cpf);

        let status = if group_valid && cpf_valid {
            EnrollmentStatus::Approved
        } else {
            EnrollmentStatus::Rejected
        };
        debug!(cpf = %payload.cpf, group_valid, cpf_valid, status = status.label(), "enrollment decided");

        let fields = EnrollmentFields {
            name: payload.name,
            age: payload.age,
            cpf: payload.cpf,
            status,
            requested_at: payload.requested_at,
            enrolled_at: (status == EnrollmentStatus::Approved).then(|| Utc::now().timestamp()),
            age_group_name: if group_valid { group_name } else { None },
        };

        // The merge against the stored record happens inside the store lock.
        let candidate = Enrollment::new(fields)?;
        Ok(match self.enrollments.apply_final(candidate)? {
            ApplyOutcome::Inserted => FinalizeOutcome::Inserted(status),
            ApplyOutcome::Updated => FinalizeOutcome::Updated(status),
            ApplyOutcome::Unchanged => FinalizeOutcome::Skipped,
        })
    }

    /// Decode a raw message body and finalize it.
    pub fn process(&self, body: &[u8]) -> Result<FinalizeOutcome, FinalizeError> {
        let payload = EnrollmentPayload::from_json(body)?;
        self.finalize(payload)
    }
}

#[async_trait]
impl<G, E> DeliveryHandler for Finalizer<G, E>
where
    G: AgeGroupRepository + 'static,
    E: EnrollmentRepository + 'static,
{
    async fn handle(&self, body: &[u8]) -> DeliveryDecision {
        if !self.min_processing.is_zero() {
            tokio::time::sleep(self.min_processing).await;
        }

        let worker = self.clone();
        let body = body.to_vec();
        let outcome = store::blocking(move || worker.process(&body)).await;

        match outcome {
            Ok(FinalizeOutcome::Skipped) => {
                info!("approved enrollment already stored; message skipped");
                DeliveryDecision::Ack
            }
            Ok(FinalizeOutcome::Inserted(status)) => {
                info!(status = status.label(), "enrollment inserted");
                DeliveryDecision::Ack
            }
            Ok(FinalizeOutcome::Updated(status)) => {
                info!(status = status.label(), "enrollment updated");
                DeliveryDecision::Ack
            }
            Err(err) => {
                warn!(error = %err, "enrollment processing failed; requeueing");
                DeliveryDecision::Requeue
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FinalizeError {
    #[error("malformed enrollment message: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    InvalidEnrollment(#[from] EnrollmentError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
