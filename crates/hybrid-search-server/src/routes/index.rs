//! `POST /v1/index/upload` and `POST /v1/index/commit_tus`: the ingestion
//! write path.

use crate::context::AppContext;
use crate::error::{ApiError, ApiResult};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use hybrid_search_core::model::Chunk;
use hybrid_search_core::AppError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

fn api_key(headers: &HeaderMap) -> Option<&str> {
    headers.get("x-api-key").and_then(|v| v.to_str().ok())
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub tenant_id: String,
    pub chunks: Vec<Chunk>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub qdrant: usize,
    pub opensearch: usize,
}

pub async fn upload(
    State(context): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(body): Json<UploadRequest>,
) -> ApiResult<Json<UploadResponse>> {
    context.api_keys.enforce(&body.tenant_id, api_key(&headers))?;

    let chunks: Vec<Chunk> = body
        .chunks
        .into_iter()
        .map(|mut chunk| {
            chunk.tenant_id = body.tenant_id.clone();
            chunk
        })
        .collect();

    let outcome = context.ingestion.ingest_chunks(&body.tenant_id, &chunks).await?;
    context.stats.record_index(outcome.vector_count as u64);

    Ok(Json(UploadResponse {
        status: "ok",
        qdrant: outcome.vector_count,
        opensearch: outcome.lexical_count,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CommitTusRequest {
    pub tenant_id: String,
    pub repo_id: String,
    pub chunk: Chunk,
    pub tus_key: String,
}

#[derive(Debug, Serialize)]
pub struct CommitTusResponse {
    pub status: &'static str,
    pub chunk_id: String,
}

pub async fn commit_tus(
    State(context): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(body): Json<CommitTusRequest>,
) -> ApiResult<Json<CommitTusResponse>> {
    context.api_keys.enforce(&body.tenant_id, api_key(&headers))?;

    if body.tus_key.trim().is_empty() {
        return Err(ApiError::from(AppError::BadRequest("tus_key must not be empty".to_string())));
    }

    let chunk_id = context
        .ingestion
        .commit_tus(&body.tenant_id, &body.repo_id, body.chunk, &body.tus_key)
        .await?;
    context.stats.record_index(1);

    Ok(Json(CommitTusResponse {
        status: "ok",
        chunk_id,
    }))
}
