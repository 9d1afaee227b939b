use crate::demo::{run_demo, DemoArgs};
use crate::{server, worker};
use clap::{Args, Parser, Subcommand};
use enrollment_hub::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Enrollment Hub",
    about = "Age-bracket registry and queued enrollment finalization",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Consume enrollment requests and persist final decisions
    Worker,
    /// Register the default age brackets in the configured store
    Seed,
    /// Run the request -> finalize pipeline in memory and print each step
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Worker => worker::run().await,
        Command::Seed => worker::seed(),
        Command::Demo(args) => run_demo(args).await,
    }
}
