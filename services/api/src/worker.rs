use crate::infra::shutdown_signal;
use enrollment_hub::config::AppConfig;
use enrollment_hub::enrollment::Finalizer;
use enrollment_hub::error::AppError;
use enrollment_hub::messaging::AmqpConsumer;
use enrollment_hub::registry::AgeGroupRegistry;
use enrollment_hub::store::JsonFileStore;
use enrollment_hub::telemetry;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(config.environment, &config.telemetry)?;

    let store = Arc::new(JsonFileStore::from_config(&config.store));
    let finalizer = Finalizer::new(store.clone(), store, config.worker.min_processing);
    let consumer = AmqpConsumer::from_config(&config.broker);

    info!(
        queue = %config.broker.queue,
        floor_ms = config.worker.min_processing.as_millis() as u64,
        "enrollment worker starting"
    );
    consumer.run(&finalizer, shutdown_signal()).await?;
    info!("enrollment worker stopped");
    Ok(())
}

pub(crate) fn seed() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(config.environment, &config.telemetry)?;

    let store = Arc::new(JsonFileStore::from_config(&config.store));
    let registry = AgeGroupRegistry::new(store.clone(), store);
    let report = registry.seed_defaults()?;

    for group in &report.created {
        let range = group.age_range();
        println!(
            "created {} ({}-{})",
            group.name(),
            range.min_age(),
            range.max_age()
        );
    }
    for name in &report.skipped {
        println!("skipped {name}: already registered");
    }
    for conflict in &report.conflicts {
        println!("conflict: {conflict}");
    }
    Ok(())
}
