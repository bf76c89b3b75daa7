use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AccessQuery {
    /// URL validity in seconds / 链接有效期（秒）
    pub ttl: Option<u64>,
}

/// Presigned download link / 预签名下载链接
#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub url: String,
    pub file_name: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub expires_in: i64,
    pub message: String,
}

/// GET /api/access?ttl= - 生成限时下载链接
pub async fn grant_access(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AccessQuery>,
) -> ApiResult<AccessResponse> {
    let ttl = params.ttl.unwrap_or(state.access.default_ttl_secs as u64);
    let locator = state.session.lock().await.locator().clone();

    let grant = state.granter.grant_access(&locator, ttl).await?;
    let now = grant.issued_at;

    Ok(Json(ApiResponse::success(AccessResponse {
        file_name: locator.identity().file_name().to_string(),
        expires_in: grant.expires_in_secs(now),
        message: grant.validity_message(now),
        url: grant.url,
        issued_at: grant.issued_at,
        expires_at: grant.expires_at,
    })))
}
