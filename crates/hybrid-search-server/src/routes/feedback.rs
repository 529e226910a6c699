//! `POST /v1/feedback`: click/grade signal for offline ranker training.

use crate::context::AppContext;
use crate::error::ApiResult;
use axum::extract::State;
use axum::Json;
use hybrid_search_core::model::FeedbackEvent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub search_id: String,
    pub clicked_chunk_id: String,
    pub grade: i64,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub status: &'static str,
}

pub async fn feedback(
    State(context): State<Arc<AppContext>>,
    Json(req): Json<FeedbackRequest>,
) -> ApiResult<Json<FeedbackResponse>> {
    let event = FeedbackEvent {
        search_id: req.search_id,
        clicked_chunk_id: req.clicked_chunk_id,
        grade: req.grade,
        timestamp: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
    };

    if let Err(err) = context.feedback_log.append(&event) {
        warn!("failed to append feedback log entry: {err}");
    }
    context.stats.record_feedback();

    Ok(Json(FeedbackResponse { status: "ok" }))
}
