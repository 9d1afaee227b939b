use super::common::*;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::enrollment::{EnrollmentStatus, IntakeError, IntakeService};
use crate::messaging::{EnrollmentPayload, InMemoryQueue};
use crate::store::EnrollmentRepository;

#[test]
fn submit_builds_pending_payload_for_covering_group() {
    let store = CountingStore::with_kids();
    let queue = Arc::new(InMemoryQueue::new());

    let payload = intake(&store, &queue)
        .submit("Alice", 11, ALICE_CPF)
        .expect("payload");

    assert_eq!(payload.status, EnrollmentStatus::Pending);
    assert_eq!(payload.age_group_name.as_deref(), Some("KIDS"));
    assert!(payload.requested_at.is_some());
    assert!(queue.is_empty());
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn non_covering_age_publishes_nothing() {
    let store = CountingStore::with_kids();
    let queue = Arc::new(InMemoryQueue::new());

    let result = intake(&store, &queue).request("Alice", 40, ALICE_CPF).await;

    assert!(matches!(result, Err(IntakeError::NoCoveringGroup { age: 40 })));
    assert_eq!(queue.published(), 0);
    assert!(store.find_by_cpf(ALICE_CPF).expect("lookup").is_none());
}

#[tokio::test]
async fn approved_cpf_is_refused() {
    let store = CountingStore::with_kids();
    EnrollmentRepository::insert(store.as_ref(), stored(EnrollmentStatus::Approved, Some("KIDS")))
        .expect("insert");
    let queue = Arc::new(InMemoryQueue::new());

    let result = intake(&store, &queue).request("Alice", 11, ALICE_CPF).await;

    assert!(matches!(result, Err(IntakeError::AlreadyApproved(_))));
    assert_eq!(queue.published(), 0);
}

#[tokio::test]
async fn rejected_cpf_may_request_again() {
    let store = CountingStore::with_kids();
    EnrollmentRepository::insert(store.as_ref(), stored(EnrollmentStatus::Rejected, None))
        .expect("insert");
    let queue = Arc::new(InMemoryQueue::new());

    intake(&store, &queue)
        .request("Alice", 11, ALICE_CPF)
        .await
        .expect("queued");

    let bodies = queue.peek_bodies();
    assert_eq!(bodies.len(), 1);
    let queued = EnrollmentPayload::from_json(&bodies[0]).expect("decodes");
    assert_eq!(queued.cpf, ALICE_CPF);
}

#[test]
fn malformed_cpf_is_invalid_enrollment() {
    let store = CountingStore::with_kids();
    let queue = Arc::new(InMemoryQueue::new());

    let result = intake(&store, &queue).submit("Alice", 11, "44135444806");

    assert!(matches!(result, Err(IntakeError::InvalidEnrollment(_))));
}

#[tokio::test]
async fn publish_failure_surfaces_to_caller() {
    let store = CountingStore::with_kids();
    let publisher = Arc::new(DownPublisher::default());
    let service = IntakeService::new(store.clone(), store.clone(), publisher.clone());

    let result = service.request("Alice", 11, ALICE_CPF).await;

    assert!(matches!(result, Err(IntakeError::Publish(_))));
    assert_eq!(publisher.attempts.load(Ordering::SeqCst), 1);
    assert_eq!(store.writes(), 0);
}
