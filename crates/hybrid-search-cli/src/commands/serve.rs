//! `hybrid-search serve`: run the HTTP server in-process.

use anyhow::Result;
use hybrid_search_core::config::AppConfig;
use hybrid_search_server::context::AppContext;
use hybrid_search_server::routes;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub async fn run() -> Result<()> {
    let config = AppConfig::from_env();
    let bind_addr = config.bind_addr.clone();
    let context = Arc::new(AppContext::build(config)?);
    let app = routes::router(context);

    let listener = TcpListener::bind(&bind_addr).await?;
    info!(%bind_addr, "hybrid-search-server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
