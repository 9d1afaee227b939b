use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::admin::EnrollmentAdmin;
use super::domain::{Enrollment, EnrollmentStatus};
use super::intake::{IntakeError, IntakeService};
use crate::cpf;
use crate::messaging::EnrollmentPublisher;
use crate::store::{
    self, AgeGroupRepository, EnrollmentRepository, Page, PageRequest, RepositoryError,
};

const MIN_NAME_LEN: usize = 3;

/// Shared state behind the enrollment endpoints.
pub struct EnrollmentApi<S, P> {
    pub intake: IntakeService<S, S, P>,
    pub admin: EnrollmentAdmin<S>,
}

impl<S, P> EnrollmentApi<S, P>
where
    S: AgeGroupRepository + EnrollmentRepository + 'static,
    P: EnrollmentPublisher + 'static,
{
    pub fn new(store: Arc<S>, publisher: Arc<P>) -> Self {
        Self {
            intake: IntakeService::new(store.clone(), store.clone(), publisher),
            admin: EnrollmentAdmin::new(store),
        }
    }
}

/// Router builder exposing intake, status polling, and admin queries.
pub fn enrollment_router<S, P>(api: Arc<EnrollmentApi<S, P>>) -> Router
where
    S: AgeGroupRepository + EnrollmentRepository + 'static,
    P: EnrollmentPublisher + 'static,
{
    Router::new()
        .route("/enrollments", post(request_handler::<S, P>))
        .route("/enrollments/:cpf", get(status_handler::<S, P>))
        .route("/enrollments/admin/all", get(list_all_handler::<S, P>))
        .route(
            "/enrollments/admin/by-cpf/:cpf",
            get(by_cpf_handler::<S, P>),
        )
        .route(
            "/enrollments/admin/by-group/:name",
            get(by_group_handler::<S, P>),
        )
        .route("/enrollments/admin/by-name", get(by_name_handler::<S, P>))
        .route(
            "/enrollments/admin/by-status",
            get(by_status_handler::<S, P>),
        )
        .with_state(api)
}

/// Inbound enrollment request body.
#[derive(Debug, Clone, Deserialize)]
pub struct EnrollmentRequest {
    pub name: String,
    pub age: u32,
    pub cpf: String,
}

impl EnrollmentRequest {
    fn validate(&self) -> Result<(), String> {
        if self.name.trim().chars().count() < MIN_NAME_LEN {
            return Err(format!("name must have at least {MIN_NAME_LEN} characters"));
        }
        if !cpf::is_display_format(&self.cpf) {
            return Err("cpf must match 999.999.999-99 format".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl PageQuery {
    pub fn request(&self) -> PageRequest {
        PageRequest::new(
            self.page.unwrap_or(1),
            self.page_size.unwrap_or(PageRequest::DEFAULT_PAGE_SIZE),
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct NameQuery {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let payload = json!({
        "error": message.into(),
    });
    (status, axum::Json(payload)).into_response()
}

pub(crate) fn repository_failure(err: &RepositoryError) -> Response {
    match err {
        RepositoryError::LockTimeout(_) => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, err.to_string())
        }
        other => {
            error!(error = %other, "enrollment store failure");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

fn page_response(result: Result<Page<Enrollment>, RepositoryError>) -> Response {
    match result {
        Ok(page) => (StatusCode::OK, axum::Json(page)).into_response(),
        Err(err) => repository_failure(&err),
    }
}

pub(crate) async fn request_handler<S, P>(
    State(api): State<Arc<EnrollmentApi<S, P>>>,
    axum::Json(request): axum::Json<EnrollmentRequest>,
) -> Response
where
    S: AgeGroupRepository + EnrollmentRepository + 'static,
    P: EnrollmentPublisher + 'static,
{
    if let Err(message) = request.validate() {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, message);
    }

    match api
        .intake
        .request(&request.name, request.age, &request.cpf)
        .await
    {
        Ok(payload) => {
            let body = json!({
                "message": "enrollment request accepted",
                "cpf": payload.cpf,
                "age_group_name": payload.age_group_name,
                "status": payload.status.label(),
            });
            (StatusCode::ACCEPTED, axum::Json(body)).into_response()
        }
        Err(err @ (IntakeError::NoCoveringGroup { .. } | IntakeError::InvalidEnrollment(_))) => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
        }
        Err(err @ IntakeError::AlreadyApproved(_)) => {
            error_response(StatusCode::CONFLICT, err.to_string())
        }
        Err(IntakeError::Publish(err)) => {
            error!(error = %err, cpf = %request.cpf, "enrollment request not queued");
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "enrollment queue unavailable, try again later",
            )
        }
        Err(IntakeError::Repository(err)) => repository_failure(&err),
    }
}

pub(crate) async fn status_handler<S, P>(
    State(api): State<Arc<EnrollmentApi<S, P>>>,
    Path(cpf): Path<String>,
) -> Response
where
    S: AgeGroupRepository + EnrollmentRepository + 'static,
    P: EnrollmentPublisher + 'static,
{
    match store::blocking(move || api.intake.status(&cpf)).await {
        Ok(Some(record)) => {
            let body = json!({
                "name": record.name(),
                "age": record.age(),
                "cpf": record.cpf(),
                "status": record.status().label(),
            });
            (StatusCode::OK, axum::Json(body)).into_response()
        }
        Ok(None) => error_response(StatusCode::NOT_FOUND, "enrollment not found"),
        Err(IntakeError::Repository(err)) => repository_failure(&err),
        Err(other) => error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

async fn list_all_handler<S, P>(
    State(api): State<Arc<EnrollmentApi<S, P>>>,
    Query(page): Query<PageQuery>,
) -> Response
where
    S: AgeGroupRepository + EnrollmentRepository + 'static,
    P: EnrollmentPublisher + 'static,
{
    let page = page.request();
    page_response(store::blocking(move || api.admin.list_all(page)).await)
}

async fn by_cpf_handler<S, P>(
    State(api): State<Arc<EnrollmentApi<S, P>>>,
    Path(cpf): Path<String>,
) -> Response
where
    S: AgeGroupRepository + EnrollmentRepository + 'static,
    P: EnrollmentPublisher + 'static,
{
    match store::blocking(move || api.admin.get_by_cpf(&cpf)).await {
        Ok(Some(record)) => (StatusCode::OK, axum::Json(record)).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "enrollment not found"),
        Err(err) => repository_failure(&err),
    }
}

async fn by_group_handler<S, P>(
    State(api): State<Arc<EnrollmentApi<S, P>>>,
    Path(name): Path<String>,
    Query(page): Query<PageQuery>,
) -> Response
where
    S: AgeGroupRepository + EnrollmentRepository + 'static,
    P: EnrollmentPublisher + 'static,
{
    let page = page.request();
    page_response(store::blocking(move || api.admin.list_by_age_group(&name, page)).await)
}

async fn by_name_handler<S, P>(
    State(api): State<Arc<EnrollmentApi<S, P>>>,
    Query(filter): Query<NameQuery>,
    Query(page): Query<PageQuery>,
) -> Response
where
    S: AgeGroupRepository + EnrollmentRepository + 'static,
    P: EnrollmentPublisher + 'static,
{
    let page = page.request();
    page_response(store::blocking(move || api.admin.list_by_name(&filter.name, page)).await)
}

pub(crate) async fn by_status_handler<S, P>(
    State(api): State<Arc<EnrollmentApi<S, P>>>,
    Query(filter): Query<StatusQuery>,
    Query(page): Query<PageQuery>,
) -> Response
where
    S: AgeGroupRepository + EnrollmentRepository + 'static,
    P: EnrollmentPublisher + 'static,
{
    let status: EnrollmentStatus = match filter.status.parse() {
        Ok(status) => status,
        Err(err) => return error_response(StatusCode::UNPROCESSABLE_ENTITY, format!("{err}")),
    };
    let page = page.request();
    page_response(store::blocking(move || api.admin.list_by_status(status, page)).await)
}
