use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use enrollment_hub::enrollment::{enrollment_router, EnrollmentApi};
use enrollment_hub::messaging::EnrollmentPublisher;
use enrollment_hub::registry::{age_group_router, AgeGroupRegistry};
use enrollment_hub::store::{AgeGroupRepository, EnrollmentRepository};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_service_routes<S, P>(
    registry: Arc<AgeGroupRegistry<S, S>>,
    api: Arc<EnrollmentApi<S, P>>,
) -> axum::Router
where
    S: AgeGroupRepository + EnrollmentRepository + 'static,
    P: EnrollmentPublisher + 'static,
{
    age_group_router(registry)
        .merge(enrollment_router(api))
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
