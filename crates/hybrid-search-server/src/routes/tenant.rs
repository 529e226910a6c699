//! `GET /v1/tenant/salt`: current salt rotation lookup.

use crate::context::AppContext;
use crate::error::ApiResult;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct SaltQuery {
    pub tenant_id: String,
}

#[derive(Debug, Serialize)]
pub struct SaltResponse {
    pub tenant_id: String,
    pub salt_ver: u32,
    pub salt: String,
}

pub async fn get_salt(
    State(context): State<Arc<AppContext>>,
    Query(query): Query<SaltQuery>,
) -> ApiResult<Json<SaltResponse>> {
    let (salt_ver, salt) = context.salts.current(&query.tenant_id).await?;
    Ok(Json(SaltResponse {
        tenant_id: query.tenant_id,
        salt_ver,
        salt,
    }))
}
