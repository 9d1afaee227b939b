use crate::cli::ServeArgs;
use crate::infra::{shutdown_signal, AppState};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use enrollment_hub::config::AppConfig;
use enrollment_hub::enrollment::EnrollmentApi;
use enrollment_hub::error::AppError;
use enrollment_hub::messaging::{AmqpPublisher, EnrollmentPublisher};
use enrollment_hub::registry::AgeGroupRegistry;
use enrollment_hub::store::JsonFileStore;
use enrollment_hub::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(config.environment, &config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(JsonFileStore::from_config(&config.store));
    let publisher = Arc::new(AmqpPublisher::from_config(&config.broker));
    let registry = Arc::new(AgeGroupRegistry::new(store.clone(), store.clone()));
    let api = Arc::new(EnrollmentApi::new(store.clone(), publisher.clone()));

    let app = with_service_routes(registry, api)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        store = %store.path().display(),
        queue = publisher.queue(),
        "enrollment service ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    readiness_flag.store(false, Ordering::Release);
    publisher.close().await;
    info!("enrollment service stopped");
    Ok(())
}
