use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::ApiResponse;
use crate::state::AppState;

/// GET /api/health - 健康检查
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "build_time": env!("BUILD_TIME"),
    }))
}

/// Object the session points at / 当前会话指向的对象
#[derive(Debug, Clone, Serialize)]
pub struct ObjectInfo {
    pub bucket: String,
    pub key: String,
    pub region: Option<String>,
    pub file_name: String,
    pub store: String,
    /// Previews currently cached / 已缓存的预览数
    pub cached_previews: usize,
}

/// GET /api/object
pub async fn get_object(State(state): State<Arc<AppState>>) -> Json<ApiResponse<ObjectInfo>> {
    let locator = state.session.lock().await.locator().clone();
    let identity = locator.identity();
    let store = locator
        .client()
        .map(|client| client.name().to_string())
        .unwrap_or_else(|_| "unavailable".to_string());

    Json(ApiResponse::success(ObjectInfo {
        bucket: identity.bucket.clone(),
        key: identity.key.clone(),
        region: identity.region.clone(),
        file_name: identity.file_name().to_string(),
        store,
        cached_previews: state.cache.len(),
    }))
}
