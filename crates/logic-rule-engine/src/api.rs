//! HTTP 接口
//!
//! 所有响应使用统一的 `ApiResponse` 包装；校验类失败返回 4xx，内部失败返回 5xx。

use crate::error::ServiceError;
use crate::models::{EngineResult, TestRuleResult};
use crate::service::{LogicService, RunRulesRequest, TestRuleRequest};
use axum::extract::rejection::JsonRejection;
use axum::extract::{MatchedPath, Path, Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use logic_shared::observability::metrics::record_http_request;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Axum 应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LogicService>,
}

impl AppState {
    pub fn new(service: Arc<LogicService>) -> Self {
        Self { service }
    }
}

/// 统一响应格式
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            code: "SUCCESS".to_string(),
            message: "操作成功".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            code: code.into(),
            message: message.into(),
            data: None,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = if status.is_server_error() {
            error!(error = %self, "请求处理失败");
            "服务内部错误，请稍后重试".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ApiResponse::<()>::error(self.error_code(), message))).into_response()
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::Validation(rejection.body_text())
    }
}

/// 构建路由
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/logic-rules/run", post(run_rules))
        .route("/api/logic-rules/{id}/test", post(test_rule))
        .route("/api/logic-rules/samples", get(list_sample_categories))
        .route("/api/logic-rules/samples/{category}", get(sample_payload))
        .layer(middleware::from_fn(http_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 健康检查
///
/// GET /health
async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// 运行全部适用规则
///
/// POST /api/logic-rules/run
async fn run_rules(
    State(state): State<AppState>,
    payload: Result<Json<RunRulesRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<EngineResult>>, ServiceError> {
    let Json(req) = payload?;
    let result = state.service.run_rules(req).await?;

    info!(
        rules_triggered = result.rules_triggered,
        actions_executed = result.actions_executed,
        "规则运行请求完成"
    );
    Ok(Json(ApiResponse::success(result)))
}

/// 试运行指定规则
///
/// POST /api/logic-rules/{id}/test
async fn test_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<TestRuleRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<TestRuleResult>>, ServiceError> {
    let Json(req) = payload?;
    let result = state.service.test_rule(&id, req).await?;
    Ok(Json(ApiResponse::success(result)))
}

/// 列出样例类别
///
/// GET /api/logic-rules/samples
async fn list_sample_categories(
    State(state): State<AppState>,
) -> Json<ApiResponse<Vec<&'static str>>> {
    Json(ApiResponse::success(state.service.sample_categories()))
}

/// 获取样例数据
///
/// GET /api/logic-rules/samples/{category}
async fn sample_payload(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<ApiResponse<Value>>, ServiceError> {
    let payload = state.service.sample_payload(&category)?;
    Ok(Json(ApiResponse::success(payload)))
}

/// HTTP 请求指标，路径使用路由模板避免标签基数膨胀
async fn http_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}
