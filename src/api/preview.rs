use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;

use crate::api::{ApiError, ApiResponse, ApiResult};
use crate::config::PreviewConfig;
use crate::dataset::{ColumnKind, PreviewDataset, Value};
use crate::error::PreviewError;
use crate::query::{self, FilterSpec, SummaryReport};
use crate::state::AppState;

/// Load request / 加载请求
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadRequest {
    /// Rows to read, defaults to the configured limit / 读取行数
    pub limit: Option<usize>,
    /// Read the whole object (needs `allow_unbounded`) / 读取整个对象
    #[serde(default)]
    pub unbounded: bool,
}

/// Filters applied to the loaded preview / 查询过滤条件
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryRequest {
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
}

#[derive(Debug, Deserialize)]
pub struct ValuesQuery {
    pub column: String,
}

/// Loaded preview metadata / 预览元信息
#[derive(Debug, Serialize)]
pub struct PreviewInfo {
    pub columns: Vec<String>,
    pub kinds: Vec<ColumnKind>,
    pub row_count: usize,
    pub row_limit: Option<usize>,
    pub limit_reached: bool,
}

impl From<&PreviewDataset> for PreviewInfo {
    fn from(dataset: &PreviewDataset) -> Self {
        Self {
            columns: dataset.columns().to_vec(),
            kinds: dataset.kinds().to_vec(),
            row_count: dataset.row_count(),
            row_limit: dataset.row_limit(),
            limit_reached: dataset.limit_reached(),
        }
    }
}

/// Filtered rows / 过滤结果
#[derive(Debug, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub total_rows: usize,
    /// Rows in the preview before filtering / 过滤前的行数
    pub source_rows: usize,
}

/// Parse a JSON request body; an empty body means the defaults
/// 解析JSON请求体，空请求体使用默认值，格式错误返回 400
fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, PreviewError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| PreviewError::InvalidArgument(format!("invalid request body: {}", e)))
}

/// Resolve the requested row limit against configuration / 根据配置确定行数上限
fn resolve_row_limit(config: &PreviewConfig, req: &LoadRequest) -> Result<Option<usize>, PreviewError> {
    if req.unbounded {
        if !config.allow_unbounded {
            return Err(PreviewError::InvalidArgument(
                "unbounded preview is disabled".to_string(),
            ));
        }
        return Ok(None);
    }
    let limit = req.limit.unwrap_or(config.default_row_limit);
    if limit == 0 || limit > config.max_row_limit {
        return Err(PreviewError::InvalidArgument(format!(
            "limit must be between 1 and {}, got {}",
            config.max_row_limit, limit
        )));
    }
    Ok(Some(limit))
}

/// Current preview, loading the default one when nothing is loaded yet
/// 获取当前预览，未加载时按默认行数加载
async fn current_or_load(state: &AppState) -> Result<Arc<PreviewDataset>, PreviewError> {
    let mut session = state.session.lock().await;
    match session.current() {
        Ok(dataset) => Ok(dataset),
        Err(PreviewError::NoPreview) => {
            let limit = resolve_row_limit(&state.preview, &LoadRequest::default())?;
            session.load(limit).await
        }
        Err(e) => Err(e),
    }
}

/// POST /api/preview/load
pub async fn load_preview(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<PreviewInfo> {
    let req: LoadRequest = parse_body(&body)?;
    let limit = resolve_row_limit(&state.preview, &req)?;
    let dataset = state.session.lock().await.load(limit).await?;
    Ok(Json(ApiResponse::success(PreviewInfo::from(dataset.as_ref()))))
}

/// POST /api/preview/reload - 清除缓存后重新读取
pub async fn reload_preview(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<PreviewInfo> {
    let req: LoadRequest = parse_body(&body)?;
    let limit = resolve_row_limit(&state.preview, &req)?;
    let dataset = state.session.lock().await.reload(limit).await?;
    Ok(Json(ApiResponse::success(PreviewInfo::from(dataset.as_ref()))))
}

/// POST /api/preview/query
pub async fn query_preview(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<QueryResult> {
    let req: QueryRequest = parse_body(&body)?;
    let dataset = current_or_load(&state).await?;
    let filtered = query::apply_filters(&dataset, &req.filters)?;

    tracing::debug!(
        "Query: {} filters, {} -> {} rows",
        req.filters.len(),
        dataset.row_count(),
        filtered.row_count()
    );

    Ok(Json(ApiResponse::success(QueryResult {
        columns: filtered.columns().to_vec(),
        total_rows: filtered.row_count(),
        source_rows: dataset.row_count(),
        rows: filtered.rows().to_vec(),
    })))
}

/// GET /api/preview/values?column=
pub async fn column_values(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ValuesQuery>,
) -> ApiResult<Vec<String>> {
    let dataset = current_or_load(&state).await?;
    let values = query::distinct_values(&dataset, &params.column)?;
    Ok(Json(ApiResponse::success(values)))
}

/// POST /api/preview/summary
pub async fn summary(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<SummaryReport> {
    let req: QueryRequest = parse_body(&body)?;
    let dataset = current_or_load(&state).await?;
    let filtered = query::apply_filters(&dataset, &req.filters)?;
    Ok(Json(ApiResponse::success(query::summarize(&filtered))))
}

/// POST /api/preview/export - 导出过滤后的预览为CSV
pub async fn export_preview(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let req: QueryRequest = parse_body(&body)?;
    let dataset = current_or_load(&state).await?;
    let filtered = query::apply_filters(&dataset, &req.filters)?;
    let bytes = query::serialize(&filtered)?;

    let file_name = {
        let session = state.session.lock().await;
        export_file_name(session.locator().identity().file_name())
    };
    let encoded = urlencoding::encode(&file_name);

    tracing::info!("Export: {} ({} rows, {} bytes)", file_name, filtered.row_count(), bytes.len());

    let disposition = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii_fallback(&file_name),
        encoded
    );
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, query::CSV_MIME.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// Plain `filename=` value, non-ASCII and quotes replaced / 非ASCII字符替换为下划线
fn ascii_fallback(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .map(|c| if c == '"' || c == '\\' { '_' } else { c })
        .collect()
}

/// `big.csv` -> `big_preview.csv`
fn export_file_name(source: &str) -> String {
    let stem = source
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .filter(|stem| !stem.is_empty())
        .unwrap_or(source);
    let stem = if stem.is_empty() { "data" } else { stem };
    format!("{}_preview.csv", stem)
}
