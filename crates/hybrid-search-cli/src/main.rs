//! Operator CLI for the hybrid code search service.

use anyhow::Result;
use clap::Parser;

mod app;
mod commands;

use app::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => commands::serve::run().await,
        Commands::Tenant(args) => commands::tenant::run(args.action).await,
        Commands::Stats(args) => commands::stats::run(&args.server_url).await,
    }
}
