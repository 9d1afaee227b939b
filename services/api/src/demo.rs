use clap::Args;
use enrollment_hub::enrollment::{Finalizer, IntakeService};
use enrollment_hub::error::AppError;
use enrollment_hub::messaging::InMemoryQueue;
use enrollment_hub::registry::AgeGroupRegistry;
use enrollment_hub::store::MemoryStore;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Applicant name used for the demo request.
    #[arg(long, default_value = "Alice")]
    pub(crate) name: String,
    /// Applicant age; must fall in one of the seeded brackets to be queued.
    #[arg(long, default_value_t = 11)]
    pub(crate) age: u32,
    /// Applicant cpf in 999.999.999-99 format.
    #[arg(long, default_value = "441.354.448-06")]
    pub(crate) cpf: String,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { name, age, cpf } = args;

    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(InMemoryQueue::new());
    let registry = AgeGroupRegistry::new(store.clone(), store.clone());
    let intake = IntakeService::new(store.clone(), store.clone(), queue.clone());
    let finalizer = Finalizer::new(store.clone(), store.clone(), Duration::ZERO);

    println!("Enrollment pipeline demo");
    let seeded = registry.seed_defaults()?;
    for group in &seeded.created {
        let range = group.age_range();
        println!(
            "- bracket {} covers {}-{}",
            group.name(),
            range.min_age(),
            range.max_age()
        );
    }

    println!("\nRequest: {name} / {age} / {cpf}");
    let payload = match intake.request(&name, age, &cpf).await {
        Ok(payload) => payload,
        Err(err) => {
            println!("  Request refused: {err}");
            return Ok(());
        }
    };
    println!(
        "  Queued as {} for bracket {}",
        payload.status.label(),
        payload.age_group_name.as_deref().unwrap_or("-")
    );

    let delivered = queue.drain(&finalizer, 10).await;
    println!("  Worker settled {delivered} message(s)");

    match intake.status(&cpf) {
        Ok(Some(record)) => {
            println!(
                "  Stored decision: {} (bracket {}, enrolled_at {})",
                record.status().label(),
                record.age_group_name().unwrap_or("-"),
                record
                    .enrolled_at()
                    .map_or_else(|| "-".to_string(), |ts| ts.to_string())
            );
        }
        Ok(None) => println!("  No decision stored"),
        Err(err) => println!("  Status unavailable: {err}"),
    }

    println!("\nRepeat request for the same cpf");
    match intake.request(&name, age, &cpf).await {
        Ok(_) => println!("  Queued again (previous decision was not an approval)"),
        Err(err) => println!("  Refused: {err}"),
    }

    Ok(())
}
