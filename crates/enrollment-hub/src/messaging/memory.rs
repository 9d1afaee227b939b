use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use super::{DeliveryDecision, DeliveryHandler, EnrollmentPayload, EnrollmentPublisher, PublishError};

/// A message waiting in, or taken from, the [`InMemoryQueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub delivery_tag: u64,
    pub body: Vec<u8>,
    pub redelivered: bool,
}

#[derive(Debug, Default)]
struct QueueState {
    next_tag: u64,
    ready: VecDeque<QueuedMessage>,
    published: usize,
    closed: bool,
}

/// Process-local durable-queue stand-in with at-least-once semantics: a
/// requeued message goes back to the tail flagged as redelivered.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    state: Mutex<QueueState>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        // A poisoned queue only means a test thread panicked mid-push; the
        // data is still consistent.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Enqueue a raw body, bypassing payload encoding.
    pub fn push_raw(&self, body: Vec<u8>) -> u64 {
        let mut state = self.state();
        state.next_tag += 1;
        let delivery_tag = state.next_tag;
        state.ready.push_back(QueuedMessage {
            delivery_tag,
            body,
            redelivered: false,
        });
        state.published += 1;
        delivery_tag
    }

    pub fn len(&self) -> usize {
        self.state().ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of messages ever accepted.
    pub fn published(&self) -> usize {
        self.state().published
    }

    pub fn peek_bodies(&self) -> Vec<Vec<u8>> {
        self.state().ready.iter().map(|m| m.body.clone()).collect()
    }

    /// Take the next message and settle it with `handler`'s decision.
    pub async fn deliver_next<H>(&self, handler: &H) -> Option<(QueuedMessage, DeliveryDecision)>
    where
        H: DeliveryHandler + ?Sized,
    {
        let message = self.state().ready.pop_front()?;
        let decision = handler.handle(&message.body).await;
        if decision == DeliveryDecision::Requeue {
            debug!(delivery_tag = message.delivery_tag, "requeueing message");
            self.state().ready.push_back(QueuedMessage {
                redelivered: true,
                ..message.clone()
            });
        }
        Some((message, decision))
    }

    /// Deliver until the queue is empty or `max_deliveries` were attempted.
    /// Returns the number of deliveries made.
    pub async fn drain<H>(&self, handler: &H, max_deliveries: usize) -> usize
    where
        H: DeliveryHandler + ?Sized,
    {
        let mut delivered = 0;
        while delivered < max_deliveries {
            if self.deliver_next(handler).await.is_none() {
                break;
            }
            delivered += 1;
        }
        delivered
    }
}

#[async_trait]
impl EnrollmentPublisher for InMemoryQueue {
    async fn publish(&self, payload: &EnrollmentPayload) -> Result<(), PublishError> {
        let body = payload.to_json()?;
        if self.state().closed {
            return Err(PublishError::Closed);
        }
        self.push_raw(body);
        Ok(())
    }

    async fn close(&self) {
        self.state().closed = true;
    }
}
