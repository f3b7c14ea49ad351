//! Webhook 客户端

use crate::error::ActionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{info, instrument};

/// Webhook 请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookRequest {
    pub url: String,
    pub method: String,
    pub headers: Map<String, Value>,
    pub payload: Value,
}

/// Webhook 响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub status: u16,
}

/// Webhook 客户端接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebhookClient: Send + Sync {
    async fn send(&self, request: WebhookRequest) -> Result<WebhookResponse, ActionError>;
}

/// 基于 reqwest 的 HTTP 客户端
pub struct HttpWebhookClient {
    client: reqwest::Client,
}

impl HttpWebhookClient {
    pub fn new(timeout: Duration) -> Result<Self, ActionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ActionError::Webhook(format!("创建 HTTP 客户端失败: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookClient for HttpWebhookClient {
    #[instrument(skip(self, request), fields(url = %request.url, method = %request.method))]
    async fn send(&self, request: WebhookRequest) -> Result<WebhookResponse, ActionError> {
        let method = reqwest::Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| ActionError::InvalidParameter {
                action: "webhook".to_string(),
                reason: format!("不支持的 HTTP 方法: {}", request.method),
            })?;
        let url = reqwest::Url::parse(&request.url).map_err(|e| ActionError::InvalidParameter {
            action: "webhook".to_string(),
            reason: format!("无效的 URL '{}': {}", request.url, e),
        })?;

        let mut builder = self.client.request(method, url);
        for (name, value) in &request.headers {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            builder = builder.header(name.as_str(), value);
        }
        if !request.payload.is_null() {
            builder = builder.json(&request.payload);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ActionError::Webhook(e.to_string()))?;
        let status = response.status();

        if !status.is_success() {
            return Err(ActionError::Webhook(format!("目标返回状态码 {}", status)));
        }

        info!(status = status.as_u16(), "webhook 调用成功");
        Ok(WebhookResponse {
            status: status.as_u16(),
        })
    }
}
