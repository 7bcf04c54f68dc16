//! Handler模块

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use common::errors::{AppError, ErrorReport};
use common::middleware::RequestId;
use common::models::{QueryParams, QUERY_REQUIRED};
use common::response::ApiResponse;
use crate::state::AppState;

/// 自然语言查询
#[utoipa::path(
    get,
    path = "/api/query",
    tag = "query",
    params(QueryParams),
    responses(
        (status = 200, description = "查询成功", body = ApiResponse<String>),
        (status = 400, description = "缺少查询参数", body = ApiResponse<String>),
        (status = 500, description = "数据库、模型或智能体执行失败", body = ApiResponse<String>)
    )
)]
pub async fn run_query(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    params: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<ApiResponse<String>>, ErrorReport> {
    let report = |error: AppError| {
        ErrorReport::new(error)
            .with_request_id(request_id.as_str())
            .expose_details(state.config.expose_error_details)
            .redact(state.config.secrets())
    };

    // a repeated `query` parameter resolves to its first value
    let query = match params {
        Ok(Query(pairs)) => first_query(pairs).into_query().map_err(report)?,
        Err(_) => return Err(report(AppError::Validation(QUERY_REQUIRED.to_string()))),
    };

    info!(chars = query.chars().count(), "收到查询请求");
    let answer = state
        .query_service
        .handle_query(&query)
        .await
        .map_err(report)?;

    Ok(Json(ApiResponse::ok(answer.text)))
}

fn first_query(pairs: Vec<(String, String)>) -> QueryParams {
    let query = pairs
        .into_iter()
        .find(|(key, _)| key == "query")
        .map(|(_, value)| value)
        .unwrap_or_default();
    QueryParams { query }
}

/// 健康检查端点
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "服务运行正常", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: state.config.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}
