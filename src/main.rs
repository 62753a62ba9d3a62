mod cli;

use batchfossil::config::Config;
use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            let mut config =
                Config::load().map_err(|e| format!("Failed to load config: {}", e))?;
            args.apply(&mut config);
            batchfossil::config::validate(&config)?;
            batchfossil::api::run(config).await?
        }
    }

    Ok(())
}
