pub mod access;
pub mod preview;
pub mod server;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::PreviewError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 200,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: StatusCode, message: &str) -> Self {
        Self {
            code: code.as_u16() as i32,
            message: message.to_string(),
            data: None,
        }
    }
}

/// Error returned by handlers / 接口错误
pub struct ApiError(pub PreviewError);

impl From<PreviewError> for ApiError {
    fn from(err: PreviewError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            PreviewError::ObjectNotFound { .. } => StatusCode::NOT_FOUND,
            PreviewError::AccessDenied { .. } => StatusCode::FORBIDDEN,
            PreviewError::MalformedData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            PreviewError::TransientIo(_) => StatusCode::SERVICE_UNAVAILABLE,
            PreviewError::UnknownColumn(_) | PreviewError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            PreviewError::NoPreview => StatusCode::CONFLICT,
            PreviewError::Configuration(_) | PreviewError::Signing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        } else {
            tracing::debug!("Request rejected: {}", self.0);
        }
        (status, Json(ApiResponse::<()>::error(status, &self.0.to_string()))).into_response()
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(server::health_check))
        .route("/api/object", get(server::get_object))
        .route("/api/preview/load", post(preview::load_preview))
        .route("/api/preview/reload", post(preview::reload_preview))
        .route("/api/preview/query", post(preview::query_preview))
        .route("/api/preview/values", get(preview::column_values))
        .route("/api/preview/summary", post(preview::summary))
        .route("/api/preview/export", post(preview::export_preview))
        .route("/api/access", get(access::grant_access))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
