use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use bingen::cli::{self, Cli};

fn init_tracing(debug: bool) {
    // status lines are already printed by the front-end
    let default = if debug { "bingen=debug" } else { "bingen=warn,bingen::status=off" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.debug);
    cli::run(cli).await
}
