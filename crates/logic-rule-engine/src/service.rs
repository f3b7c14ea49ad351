//! 调用层服务
//!
//! 负责调用边界的参数校验。校验失败在引擎执行任何工作之前返回，
//! 引擎内部的失败则全部汇总在返回结果中。

use crate::engine::LogicEngine;
use crate::error::ServiceError;
use crate::models::{EngineResult, ExecutionContext, RuleRecord, TestRuleResult};
use crate::samples::SampleCategory;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{info, instrument};
use validator::{Validate, ValidationError};

/// 运行全部适用规则的请求
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RunRulesRequest {
    #[serde(default)]
    #[validate(
        required(message = "testData is required"),
        custom(function = "validate_object")
    )]
    pub test_data: Option<Value>,
    #[serde(default)]
    pub context: ExecutionContext,
    #[serde(default)]
    pub custom_rules: Option<Vec<RuleRecord>>,
}

/// 试运行单条规则的请求
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TestRuleRequest {
    #[serde(default)]
    #[validate(
        required(message = "testData is required"),
        custom(function = "validate_object")
    )]
    pub test_data: Option<Value>,
    #[serde(default)]
    pub context: ExecutionContext,
}

/// 路径上的规则 ID
#[derive(Debug, Validate)]
struct RuleLookup {
    #[validate(custom(function = "validate_not_blank"))]
    rule_id: String,
}

/// 测试数据必须是 JSON 对象
fn validate_object(value: &Value) -> Result<(), ValidationError> {
    if value.is_object() {
        return Ok(());
    }
    Err(ValidationError::new("object")
        .with_message(Cow::Borrowed("testData must be a JSON object")))
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(
            ValidationError::new("blank").with_message(Cow::Borrowed("ruleId is required"))
        );
    }
    Ok(())
}

/// 逻辑规则服务
#[derive(Clone)]
pub struct LogicService {
    engine: Arc<LogicEngine>,
}

impl LogicService {
    pub fn new(engine: Arc<LogicEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<LogicEngine> {
        &self.engine
    }

    /// 对测试数据运行全部适用规则
    #[instrument(skip(self, request))]
    pub async fn run_rules(&self, request: RunRulesRequest) -> Result<EngineResult, ServiceError> {
        request.validate()?;
        let data = request.test_data.unwrap_or_default();

        Ok(self
            .engine
            .run_logic_rules(&data, &request.context, request.custom_rules)
            .await)
    }

    /// 按 ID 加载规则并试运行
    #[instrument(skip(self, request))]
    pub async fn test_rule(
        &self,
        rule_id: &str,
        request: TestRuleRequest,
    ) -> Result<TestRuleResult, ServiceError> {
        RuleLookup {
            rule_id: rule_id.to_string(),
        }
        .validate()?;
        request.validate()?;
        let data = request.test_data.unwrap_or_default();

        let record = self
            .engine
            .rules()
            .find_by_id(rule_id)
            .await?
            .ok_or_else(|| ServiceError::RuleNotFound(rule_id.to_string()))?;
        let rule = record.decode()?;

        info!(rule_name = %rule.name, "开始试运行规则");
        Ok(self.engine.test_rule(&rule, &data, &request.context).await)
    }

    /// 获取某类别的样例数据
    pub fn sample_payload(&self, category: &str) -> Result<Value, ServiceError> {
        let category: SampleCategory = category.parse().map_err(ServiceError::Validation)?;
        Ok(category.payload())
    }

    /// 支持的样例类别
    pub fn sample_categories(&self) -> Vec<&'static str> {
        SampleCategory::ALL.iter().map(SampleCategory::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionDispatcher;
    use crate::error::StoreError;
    use crate::models::{Condition, Rule};
    use crate::operators::Operator;
    use crate::store::{
        InMemoryActivityLog, InMemoryIncidentStore, InMemoryRuleRepository, MockRuleRepository,
        RuleRepository,
    };
    use axum::http::StatusCode;
    use serde_json::json;

    fn service_with(repo: Arc<dyn RuleRepository>) -> LogicService {
        let dispatcher = ActionDispatcher::new(
            Arc::new(InMemoryIncidentStore::new()),
            Arc::new(InMemoryActivityLog::new()),
        );
        LogicService::new(Arc::new(LogicEngine::new(repo, dispatcher)))
    }

    #[tokio::test]
    async fn test_run_rules_requires_object_payload() {
        let service = service_with(Arc::new(InMemoryRuleRepository::new()));

        let err = service.run_rules(RunRulesRequest::default()).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = service
            .run_rules(RunRulesRequest {
                test_data: Some(json!([1, 2])),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_validation_messages() {
        let service = service_with(Arc::new(InMemoryRuleRepository::new()));

        let err = service
            .run_rules(RunRulesRequest {
                test_data: Some(json!("not an object")),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("testData must be a JSON object"));

        let err = service
            .test_rule("r-1", TestRuleRequest::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("testData is required"));
    }

    #[tokio::test]
    async fn test_test_rule_rejects_blank_id() {
        let mut repo = MockRuleRepository::new();
        repo.expect_find_by_id().never();
        let service = service_with(Arc::new(repo));

        let err = service
            .test_rule(
                "   ",
                TestRuleRequest {
                    test_data: Some(json!({})),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("ruleId is required"));
    }

    #[test]
    fn test_request_validate() {
        let valid = RunRulesRequest {
            test_data: Some(json!({"riskScore": 0.4})),
            ..Default::default()
        };
        assert!(valid.validate().is_ok());

        let errors = RunRulesRequest::default().validate().unwrap_err();
        assert!(errors.field_errors().contains_key("test_data"));
    }

    #[tokio::test]
    async fn test_test_rule_not_found() {
        let service = service_with(Arc::new(InMemoryRuleRepository::new()));
        let err = service
            .test_rule(
                "missing",
                TestRuleRequest {
                    test_data: Some(json!({})),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_test_rule_invalid_record_is_unprocessable() {
        let mut record = RuleRecord::from(Rule::new("broken").with_id("broken"));
        record.conditions = json!({"not": "a list"});
        let service = service_with(Arc::new(InMemoryRuleRepository::with_rules([record])));

        let err = service
            .test_rule(
                "broken",
                TestRuleRequest {
                    test_data: Some(json!({})),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_test_rule_store_failure_is_internal() {
        let mut repo = MockRuleRepository::new();
        repo.expect_find_by_id()
            .returning(|_| Err(StoreError::Unavailable("down".to_string())));
        let service = service_with(Arc::new(repo));

        let err = service
            .test_rule(
                "r-1",
                TestRuleRequest {
                    test_data: Some(json!({})),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_test_rule_by_id() {
        let rule = Rule::new("risk")
            .with_id("r-1")
            .with_condition(Condition::new("riskScore", Operator::GreaterThan, 0.8));
        let service = service_with(Arc::new(InMemoryRuleRepository::with_rules([
            RuleRecord::from(&rule),
        ])));

        let result = tokio_test::assert_ok!(
            service
                .test_rule(
                    "r-1",
                    TestRuleRequest {
                        test_data: Some(json!({"riskScore": 0.9})),
                        ..Default::default()
                    },
                )
                .await
        );
        assert!(result.triggered);
    }

    #[test]
    fn test_sample_payload() {
        let service = service_with(Arc::new(InMemoryRuleRepository::new()));
        assert!(service.sample_payload("transaction").unwrap().is_object());
        assert!(matches!(
            service.sample_payload("weather"),
            Err(ServiceError::Validation(_))
        ));
        assert_eq!(service.sample_categories().len(), 5);
    }
}
