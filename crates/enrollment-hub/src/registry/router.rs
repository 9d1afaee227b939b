use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::AgeGroupError;
use super::service::{AgeGroupRegistry, RegistryError};
use crate::enrollment::router::{repository_failure, PageQuery};
use crate::store::{self, AgeGroupRepository, EnrollmentRepository};

/// Router builder for age bracket administration.
pub fn age_group_router<G, E>(registry: Arc<AgeGroupRegistry<G, E>>) -> Router
where
    G: AgeGroupRepository + 'static,
    E: EnrollmentRepository + 'static,
{
    Router::new()
        .route(
            "/age-groups",
            get(list_handler::<G, E>).post(create_handler::<G, E>),
        )
        .route("/age-groups/:name", delete(delete_handler::<G, E>))
        .with_state(registry)
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgeGroupRequest {
    pub name: String,
    pub min_age: u32,
    pub max_age: u32,
}

fn registry_failure(err: RegistryError) -> Response {
    let status = match &err {
        RegistryError::Invalid(AgeGroupError::InvalidRange { .. }) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        RegistryError::Invalid(_) | RegistryError::InUse { .. } => StatusCode::CONFLICT,
        RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
        RegistryError::Repository(repository) => return repository_failure(repository),
    };
    let payload = json!({
        "error": err.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}

pub(crate) async fn create_handler<G, E>(
    State(registry): State<Arc<AgeGroupRegistry<G, E>>>,
    axum::Json(request): axum::Json<AgeGroupRequest>,
) -> Response
where
    G: AgeGroupRepository + 'static,
    E: EnrollmentRepository + 'static,
{
    let created = store::blocking(move || {
        registry.create(&request.name, request.min_age, request.max_age)
    })
    .await;
    match created {
        Ok(group) => (StatusCode::CREATED, axum::Json(group)).into_response(),
        Err(err) => registry_failure(err),
    }
}

async fn list_handler<G, E>(
    State(registry): State<Arc<AgeGroupRegistry<G, E>>>,
    Query(page): Query<PageQuery>,
) -> Response
where
    G: AgeGroupRepository + 'static,
    E: EnrollmentRepository + 'static,
{
    let page = page.request();
    match store::blocking(move || registry.list(page)).await {
        Ok(page) => (StatusCode::OK, axum::Json(page)).into_response(),
        Err(err) => registry_failure(err),
    }
}

pub(crate) async fn delete_handler<G, E>(
    State(registry): State<Arc<AgeGroupRegistry<G, E>>>,
    Path(name): Path<String>,
) -> Response
where
    G: AgeGroupRepository + 'static,
    E: EnrollmentRepository + 'static,
{
    match store::blocking(move || registry.delete(&name)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => registry_failure(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrollment::{Enrollment, EnrollmentFields, EnrollmentStatus};
    use crate::store::MemoryStore;
    use axum::body::Body;
    use axum::http::{header, Request};
    use tower::ServiceExt;

    fn registry() -> (Arc<AgeGroupRegistry<MemoryStore, MemoryStore>>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (
            Arc::new(AgeGroupRegistry::new(store.clone(), store.clone())),
            store,
        )
    }

    fn post_group(body: serde_json::Value) -> Request<Body> {
        Request::post("/age-groups")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn create_route_maps_outcomes() {
        let (registry, _) = registry();
        let router = age_group_router(registry);

        let created = router
            .clone()
            .oneshot(post_group(json!({"name": "KIDS", "min_age": 5, "max_age": 12})))
            .await
            .expect("response");
        assert_eq!(created.status(), StatusCode::CREATED);

        let overlap = router
            .clone()
            .oneshot(post_group(json!({"name": "TWEENS", "min_age": 12, "max_age": 14})))
            .await
            .expect("response");
        assert_eq!(overlap.status(), StatusCode::CONFLICT);

        let inverted = router
            .oneshot(post_group(json!({"name": "BAD", "min_age": 9, "max_age": 3})))
            .await
            .expect("response");
        assert_eq!(inverted.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn delete_handler_maps_not_found_and_in_use() {
        let (registry, store) = registry();
        registry.create("KIDS", 5, 12).expect("kids");
        EnrollmentRepository::insert(
            store.as_ref(),
            Enrollment::new(EnrollmentFields {
                name: "Alice".to_string(),
                age: 11,
                cpf: "441.354.448-06".to_string(),
                status: EnrollmentStatus::Approved,
                requested_at: Some(1),
                enrolled_at: Some(2),
                age_group_name: Some("KIDS".to_string()),
            })
            .expect("valid"),
        )
        .expect("insert");

        let missing = delete_handler(State(registry.clone()), Path("GHOST".to_string())).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let in_use = delete_handler(State(registry), Path("KIDS".to_string())).await;
        assert_eq!(in_use.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn delete_unused_group_returns_no_content() {
        let (registry, _) = registry();
        registry.create("KIDS", 5, 12).expect("kids");
        let response = age_group_router(registry)
            .oneshot(
                Request::delete("/age-groups/KIDS")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
