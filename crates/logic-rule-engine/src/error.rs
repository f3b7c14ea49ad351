//! 规则引擎错误类型
//!
//! 按隔离边界划分：规则解析/条件评估（`RuleError`）、动作执行（`ActionError`）、
//! 外部存储（`StoreError`）以及调用边界（`ServiceError`）。

use axum::http::StatusCode;
use logic_shared::error::LogicError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("规则解析失败: {0}")]
    Parse(String),

    #[error("条件评估失败: {0}")]
    Evaluation(String),

    #[error("类型不匹配: 期望 {expected}, 实际 {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("JSON 序列化错误: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RuleError>;

/// 单个动作执行失败的原因，只影响对应的 `ActionResult`
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("动作 {action} 缺少必需参数: {parameter}")]
    MissingParameter { action: String, parameter: String },

    #[error("动作 {action} 参数无效: {reason}")]
    InvalidParameter { action: String, reason: String },

    #[error("存储写入失败: {0}")]
    Store(#[from] StoreError),

    #[error("webhook 调用失败: {0}")]
    Webhook(String),
}

/// 外部存储（规则库、事件库、活动日志）访问错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("存储数据序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("存储不可用: {0}")]
    Unavailable(String),
}

/// 调用边界错误
///
/// 只有这一层的错误会传播给调用方；引擎内部的失败都汇总在 `EngineResult` 中。
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("参数验证失败: {0}")]
    Validation(String),

    #[error("规则未找到: {0}")]
    RuleNotFound(String),

    #[error(transparent)]
    InvalidRule(#[from] RuleError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Shared(#[from] LogicError),
}

impl ServiceError {
    /// 返回对应的 HTTP 状态码：校验类 4xx，内部失败 5xx
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::RuleNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidRule(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Shared(e) => e.status_code(),
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::RuleNotFound(_) => "RULE_NOT_FOUND",
            Self::InvalidRule(_) => "RULE_PARSE_ERROR",
            Self::Store(_) => "STORE_ERROR",
            Self::Shared(e) => e.code(),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}
