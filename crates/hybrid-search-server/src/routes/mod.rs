//! Route wiring: one module per resource group, aggregated into a single
//! [`Router`] here.

pub mod feedback;
pub mod index;
pub mod metrics;
pub mod search;
pub mod tenant;

use crate::context::AppContext;
use crate::telemetry::{self, UuidRequestId};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub fn router(context: Arc<AppContext>) -> Router {
    let request_id_header = telemetry::request_id_header();

    Router::new()
        .route("/v1/tenant/salt", get(tenant::get_salt))
        .route("/v1/index/upload", post(index::upload))
        .route("/v1/index/commit_tus", post(index::commit_tus))
        .route("/v1/search", post(search::search))
        .route("/v1/search/fetch-lines", post(search::fetch_lines))
        .route("/v1/feedback", post(feedback::feedback))
        .route("/v1/metrics", get(metrics::metrics))
        .with_state(context)
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id_header, UuidRequestId))
}
