use hybrid_search_core::config::AppConfig;
use hybrid_search_server::{context::AppContext, routes, telemetry};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    let config = AppConfig::from_env();
    let bind_addr = config.bind_addr.clone();
    let context = Arc::new(AppContext::build(config)?);
    let app = routes::router(context);

    let listener = TcpListener::bind(&bind_addr).await?;
    info!(%bind_addr, "hybrid-search-server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
