//! Enrollment request transport: the queue payload, the publisher seam used by
//! intake, and the delivery seam driven by the finalization worker.

mod amqp;
mod memory;

pub use amqp::{AmqpConsumer, AmqpPublisher, ConsumeError};
pub use memory::{InMemoryQueue, QueuedMessage};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::enrollment::{Enrollment, EnrollmentStatus};

/// JSON body carried by the enrollment request queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentPayload {
    pub name: String,
    pub age: u32,
    pub cpf: String,
    #[serde(default)]
    pub requested_at: Option<i64>,
    #[serde(default)]
    pub age_group_name: Option<String>,
    #[serde(default = "pending_status")]
    pub status: EnrollmentStatus,
}

fn pending_status() -> EnrollmentStatus {
    EnrollmentStatus::Pending
}

impl EnrollmentPayload {
    pub fn from_candidate(candidate: &Enrollment) -> Self {
        Self {
            name: candidate.name().to_string(),
            age: candidate.age(),
            cpf: candidate.cpf().to_string(),
            requested_at: candidate.requested_at(),
            age_group_name: candidate.age_group_name().map(str::to_string),
            status: candidate.status(),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_json(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}

/// Outbound side of the queue used by the intake path.
#[async_trait]
pub trait EnrollmentPublisher: Send + Sync {
    /// Deliver `payload` durably; returns only once the broker confirmed it.
    async fn publish(&self, payload: &EnrollmentPayload) -> Result<(), PublishError>;

    /// Release any open connection. Safe to call repeatedly.
    async fn close(&self);
}

/// What the consumer should tell the broker about a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryDecision {
    Ack,
    Requeue,
}

/// Inbound side of the queue: something that processes one message body.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    async fn handle(&self, body: &[u8]) -> DeliveryDecision;
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("unable to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("unable to connect to broker: {0}")]
    Connect(String),
    #[error("broker channel failure: {0}")]
    Channel(String),
    #[error("message was returned by the broker (unroutable)")]
    Unroutable,
    #[error("broker did not confirm delivery: {0}")]
    NotConfirmed(String),
    /// Only the in-memory queue refuses publishes after `close`; the AMQP
    /// publisher reconnects instead.
    #[error("publisher is closed")]
    Closed,
}
