//! CLI argument definitions.

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "hybrid-search")]
#[command(author, version, about = "Operate the hybrid code search service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server, reading `AppConfig` from the environment.
    Serve,

    /// Manage tenant API keys and inspect salt rotation.
    Tenant(TenantArgs),

    /// Fetch `/v1/metrics` from a running instance.
    Stats(StatsArgs),
}

#[derive(Args)]
pub struct TenantArgs {
    #[command(subcommand)]
    pub action: TenantAction,
}

#[derive(Subcommand)]
pub enum TenantAction {
    /// Add an API key for a tenant to the on-disk key file.
    AddKey {
        /// Tenant identifier.
        tenant_id: String,
        /// API key to grant.
        key: String,
        /// Path to the tenant key file (defaults to `API_KEYS_PATH`).
        #[arg(long)]
        path: Option<String>,
    },
    /// Print a tenant's current salt version and value.
    Salt {
        /// Tenant identifier.
        tenant_id: String,
    },
}

#[derive(Args)]
pub struct StatsArgs {
    /// Base URL of a running `hybrid-search-server` instance.
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    pub server_url: String,
}
