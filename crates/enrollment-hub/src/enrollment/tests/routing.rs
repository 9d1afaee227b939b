use super::common::*;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::enrollment::router::{request_handler, status_handler};
use crate::enrollment::{enrollment_router, EnrollmentRequest, EnrollmentStatus};
use crate::messaging::InMemoryQueue;
use crate::store::EnrollmentRepository;

fn alice(age: u32) -> EnrollmentRequest {
    EnrollmentRequest {
        name: "Alice".to_string(),
        age,
        cpf: ALICE_CPF.to_string(),
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn request_route_accepts_and_queues() {
    let store = CountingStore::with_kids();
    let queue = Arc::new(InMemoryQueue::new());
    let router = enrollment_router(api(&store, queue.clone()));

    let response = router
        .oneshot(
            Request::post("/enrollments")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"name": "Alice", "age": 11, "cpf": ALICE_CPF}).to_string(),
                ))
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = json_body(response).await;
    assert_eq!(body["age_group_name"], "KIDS");
    assert_eq!(body["status"], "PENDING");
    assert_eq!(queue.published(), 1);
}

#[tokio::test]
async fn request_handler_maps_domain_failures() {
    let store = CountingStore::with_kids();
    let queue = Arc::new(InMemoryQueue::new());
    let state = api(&store, queue.clone());

    let uncovered = request_handler(State(state.clone()), axum::Json(alice(70))).await;
    assert_eq!(uncovered.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let mut short_name = alice(11);
    short_name.name = "Al".to_string();
    let invalid = request_handler(State(state.clone()), axum::Json(short_name)).await;
    assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);

    EnrollmentRepository::insert(store.as_ref(), stored(EnrollmentStatus::Approved, Some("KIDS")))
        .expect("insert");
    let approved = request_handler(State(state), axum::Json(alice(11))).await;
    assert_eq!(approved.status(), StatusCode::CONFLICT);

    assert_eq!(queue.published(), 0);
}

#[tokio::test]
async fn request_handler_returns_unavailable_when_broker_is_down() {
    let store = CountingStore::with_kids();
    let state = api(&store, Arc::new(DownPublisher::default()));

    let response = request_handler(State(state), axum::Json(alice(11))).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn status_handler_reports_stored_record() {
    let store = CountingStore::with_kids();
    let state = api(&store, Arc::new(InMemoryQueue::new()));

    let missing = status_handler(State(state.clone()), axum::extract::Path(ALICE_CPF.to_string())).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    EnrollmentRepository::insert(store.as_ref(), stored(EnrollmentStatus::Rejected, None))
        .expect("insert");
    let found = status_handler(State(state), axum::extract::Path(ALICE_CPF.to_string())).await;
    assert_eq!(found.status(), StatusCode::OK);
    assert_eq!(
        json_body(found).await,
        json!({"name": "Alice", "age": 11, "cpf": ALICE_CPF, "status": "REJECTED"})
    );
}

#[tokio::test]
async fn admin_routes_page_results() {
    let store = CountingStore::with_kids();
    EnrollmentRepository::insert(store.as_ref(), stored(EnrollmentStatus::Approved, Some("KIDS")))
        .expect("insert");
    let router = enrollment_router(api(&store, Arc::new(InMemoryQueue::new())));

    let by_status = router
        .clone()
        .oneshot(
            Request::get("/enrollments/admin/by-status?status=approved&page=1&page_size=10")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(by_status.status(), StatusCode::OK);
    let page = json_body(by_status).await;
    assert_eq!(page["total_items"], 1);
    assert_eq!(page["page_size"], 10);
    assert_eq!(page["items"][0]["cpf"], ALICE_CPF);

    let unknown = router
        .clone()
        .oneshot(
            Request::get("/enrollments/admin/by-status?status=ARCHIVED")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(unknown.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let by_group = router
        .clone()
        .oneshot(
            Request::get("/enrollments/admin/by-group/TEENS")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(json_body(by_group).await["total_items"], 0);

    let by_cpf = router
        .oneshot(
            Request::get("/enrollments/admin/by-cpf/000.000.000-00")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(by_cpf.status(), StatusCode::NOT_FOUND);
}
