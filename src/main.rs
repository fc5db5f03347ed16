use anyhow::Result;
use clap::Parser;

use dbtrace::{Cli, load_config, observability::init_telemetry, run_demo};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let telemetry = init_telemetry(&config)?;
    tracing::info!(iterations = cli.iterations, "dbtrace demo starting up");

    let exposition = run_demo(telemetry.observability(), &config.annotation.options, cli.iterations).await?;
    println!("{}", exposition);

    telemetry.shutdown();
    Ok(())
}
