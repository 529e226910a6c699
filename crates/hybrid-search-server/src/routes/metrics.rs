//! `GET /v1/metrics`: a point-in-time snapshot of the process counters.

use crate::context::AppContext;
use axum::extract::State;
use axum::Json;
use hybrid_search_core::stats::StatsSnapshot;
use std::sync::Arc;

pub async fn metrics(State(context): State<Arc<AppContext>>) -> Json<StatsSnapshot> {
    Json(context.stats.snapshot())
}
