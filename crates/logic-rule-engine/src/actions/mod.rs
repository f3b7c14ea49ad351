//! 动作分发
//!
//! 动作类型是封闭集合，分发通过 `match` 完成。单个动作的任何失败
//! （缺少参数、参数类型错误、存储写入失败）都只记录在对应的 `ActionResult` 上，
//! 不影响同一规则的其他动作或其他规则。

mod handlers;
pub mod webhook;

pub use webhook::{HttpWebhookClient, WebhookClient, WebhookRequest, WebhookResponse};

use crate::error::ActionError;
use crate::models::{Action, ActionKind, ActionResult, ExecutionContext, Rule};
use crate::store::{ActivityLog, IncidentStore};
use logic_shared::observability::metrics::record_action;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// 动作分发器
#[derive(Clone)]
pub struct ActionDispatcher {
    incidents: Arc<dyn IncidentStore>,
    activity_log: Arc<dyn ActivityLog>,
    webhook: Option<Arc<dyn WebhookClient>>,
}

impl ActionDispatcher {
    pub fn new(incidents: Arc<dyn IncidentStore>, activity_log: Arc<dyn ActivityLog>) -> Self {
        Self {
            incidents,
            activity_log,
            webhook: None,
        }
    }

    /// 接入 webhook 客户端；未接入时 webhook 动作只返回请求描述
    pub fn with_webhook_client(mut self, client: Arc<dyn WebhookClient>) -> Self {
        self.webhook = Some(client);
        self
    }

    /// 执行单个动作，永不返回错误
    #[instrument(
        skip(self, action, rule, data, context),
        fields(rule_id = %rule.id, action_type = %action.kind)
    )]
    pub async fn execute_action(
        &self,
        action: &Action,
        rule: &Rule,
        data: &Value,
        context: &ExecutionContext,
    ) -> ActionResult {
        match self.dispatch(action, rule, data, context).await {
            Ok(result) => {
                debug!("动作执行成功");
                record_action(action.kind.as_str(), true);
                ActionResult::succeeded(action, rule, result)
            }
            Err(e) => {
                warn!(error = %e, "动作执行失败");
                record_action(action.kind.as_str(), false);
                ActionResult::failed(action, rule, e.to_string())
            }
        }
    }

    async fn dispatch(
        &self,
        action: &Action,
        rule: &Rule,
        data: &Value,
        context: &ExecutionContext,
    ) -> Result<Value, ActionError> {
        Self::check_required(action)?;

        match action.kind {
            ActionKind::NotifyAgent => self.notify_agent(action, rule),
            ActionKind::CreateIncident => self.create_incident(action, rule, context).await,
            ActionKind::FlagEntity => self.flag_entity(action, rule, context).await,
            ActionKind::UpdateField => self.update_field(action, data, context),
            ActionKind::TriggerMission => self.trigger_mission(action),
            ActionKind::SendEmail => self.send_email(action),
            ActionKind::Webhook => self.webhook(action).await,
            ActionKind::LogEvent => self.log_event(action, rule, context).await,
            ActionKind::Escalate => self.escalate(action, rule, context).await,
            ActionKind::AssignTask => self.assign_task(action),
        }
    }

    /// 必需参数缺失、为 null 或为空白字符串时报错
    fn check_required(action: &Action) -> Result<(), ActionError> {
        for name in action.kind.required_parameters() {
            let present = match action.parameters.get(*name) {
                None | Some(Value::Null) => false,
                Some(Value::String(s)) => !s.trim().is_empty(),
                Some(_) => true,
            };
            if !present {
                return Err(ActionError::MissingParameter {
                    action: action.kind.to_string(),
                    parameter: (*name).to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{
        InMemoryActivityLog, InMemoryIncidentStore, MockActivityLog, MockIncidentStore,
    };
    use mockall::predicate::*;
    use serde_json::json;
    use webhook::MockWebhookClient;

    fn dispatcher() -> (ActionDispatcher, InMemoryIncidentStore, InMemoryActivityLog) {
        let incidents = InMemoryIncidentStore::new();
        let activity = InMemoryActivityLog::new();
        let dispatcher =
            ActionDispatcher::new(Arc::new(incidents.clone()), Arc::new(activity.clone()));
        (dispatcher, incidents, activity)
    }

    fn rule() -> Rule {
        Rule::new("high_risk").with_id("rule-1")
    }

    #[tokio::test]
    async fn test_create_incident_writes_store() {
        let (dispatcher, incidents, _) = dispatcher();
        let action = Action::new(ActionKind::CreateIncident)
            .with_param("title", "High risk")
            .with_param("severity", "high");
        let ctx = ExecutionContext::new().with_mission("m-1").with_user("u-1");

        let result = dispatcher
            .execute_action(&action, &rule(), &json!({}), &ctx)
            .await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.rule_id, "rule-1");
        let created = incidents.list();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].status, "open");
        assert_eq!(created[0].source_type, "logic_rule");
        assert_eq!(created[0].tags, vec!["logic-rule", "rule-1"]);
        assert_eq!(created[0].mission_id.as_deref(), Some("m-1"));
        assert_eq!(created[0].created_by, "u-1");
        assert_eq!(result.result.unwrap()["id"], json!(created[0].id));
    }

    #[tokio::test]
    async fn test_missing_parameter_fails_action() {
        let (dispatcher, incidents, _) = dispatcher();
        let action = Action::new(ActionKind::CreateIncident).with_param("title", "No severity");

        let result = dispatcher
            .execute_action(&action, &rule(), &json!({}), &ExecutionContext::new())
            .await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("severity"));
        assert!(incidents.is_empty());
    }

    #[tokio::test]
    async fn test_blank_required_parameter_is_missing() {
        let (dispatcher, _, _) = dispatcher();
        let action = Action::new(ActionKind::NotifyAgent).with_param("agentId", "  ");
        let result = dispatcher
            .execute_action(&action, &rule(), &json!({}), &ExecutionContext::new())
            .await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_store_failure_becomes_failed_result() {
        let mut incidents = MockIncidentStore::new();
        incidents
            .expect_create_incident()
            .times(1)
            .returning(|_| Err(StoreError::Unavailable("incident db down".to_string())));
        let dispatcher = ActionDispatcher::new(
            Arc::new(incidents),
            Arc::new(InMemoryActivityLog::new()),
        );

        let action = Action::new(ActionKind::CreateIncident)
            .with_param("title", "t")
            .with_param("severity", "low");
        let result = dispatcher
            .execute_action(&action, &rule(), &json!({}), &ExecutionContext::new())
            .await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("incident db down"));
    }

    #[tokio::test]
    async fn test_activity_backed_actions() {
        let (dispatcher, _, activity) = dispatcher();
        let ctx = ExecutionContext::for_entity("mission", "m-7");

        let flag = Action::new(ActionKind::FlagEntity).with_param("flagType", "suspicious");
        let log = Action::new(ActionKind::LogEvent).with_param("eventType", "risk_detected");
        let escalate = Action::new(ActionKind::Escalate).with_param("escalationLevel", 2);

        for action in [&flag, &log, &escalate] {
            let result = dispatcher.execute_action(action, &rule(), &json!({}), &ctx).await;
            assert!(result.success, "{:?}", result.error);
        }

        let flagged = activity.by_action("entity_flagged");
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].entity_id, "m-7");
        assert_eq!(flagged[0].metadata["priority"], json!("medium"));

        let logged = activity.by_action("risk_detected");
        assert_eq!(logged[0].metadata["severity"], json!("info"));
        assert_eq!(activity.by_action("escalated").len(), 1);
    }

    #[tokio::test]
    async fn test_activity_log_failure_isolated() {
        let mut activity = MockActivityLog::new();
        activity
            .expect_record()
            .returning(|_| Err(StoreError::Unavailable("log down".to_string())));
        let dispatcher =
            ActionDispatcher::new(Arc::new(MockIncidentStore::new()), Arc::new(activity));

        let action = Action::new(ActionKind::LogEvent).with_param("eventType", "x");
        let result = dispatcher
            .execute_action(&action, &rule(), &json!({}), &ExecutionContext::new())
            .await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_descriptive_actions() {
        let (dispatcher, _, _) = dispatcher();
        let data = json!({"status": "pending"});
        let ctx = ExecutionContext::new();

        let update = Action::new(ActionKind::UpdateField)
            .with_param("field", "status")
            .with_param("value", "blocked");
        let result = dispatcher.execute_action(&update, &rule(), &data, &ctx).await;
        let payload = result.result.unwrap();
        assert_eq!(payload["previousValue"], json!("pending"));
        assert_eq!(payload["value"], json!("blocked"));

        let mission = Action::new(ActionKind::TriggerMission).with_param("missionId", "m-2");
        let result = dispatcher.execute_action(&mission, &rule(), &data, &ctx).await;
        assert_eq!(result.result.unwrap()["actionType"], json!("start"));

        let notify = Action::new(ActionKind::NotifyAgent).with_param("agentId", "a-1");
        let result = dispatcher.execute_action(&notify, &rule(), &data, &ctx).await;
        assert_eq!(result.result.unwrap()["priority"], json!("medium"));

        let email = Action::new(ActionKind::SendEmail)
            .with_param("recipient", "ops@example.com")
            .with_param("subject", "Alert");
        let result = dispatcher.execute_action(&email, &rule(), &data, &ctx).await;
        assert_eq!(result.result.unwrap()["status"], json!("queued"));

        let task = Action::new(ActionKind::AssignTask)
            .with_param("assignedTo", "ops")
            .with_param("taskTitle", "Investigate");
        let result = dispatcher.execute_action(&task, &rule(), &data, &ctx).await;
        assert_eq!(result.result.unwrap()["status"], json!("assigned"));
    }

    #[tokio::test]
    async fn test_webhook_without_client_describes_request() {
        let (dispatcher, _, _) = dispatcher();
        let action = Action::new(ActionKind::Webhook).with_param("url", "https://example.com/hook");
        let result = dispatcher
            .execute_action(&action, &rule(), &json!({}), &ExecutionContext::new())
            .await;

        let payload = result.result.unwrap();
        assert_eq!(payload["method"], json!("POST"));
        assert_eq!(payload["status"], json!("not_sent"));
    }

    #[tokio::test]
    async fn test_webhook_with_client() {
        let mut client = MockWebhookClient::new();
        client
            .expect_send()
            .with(function(|req: &WebhookRequest| req.method == "PUT"))
            .times(1)
            .returning(|_| Ok(WebhookResponse { status: 204 }));

        let (dispatcher, _, _) = dispatcher();
        let dispatcher = dispatcher.with_webhook_client(Arc::new(client));
        let action = Action::new(ActionKind::Webhook)
            .with_param("url", "https://example.com/hook")
            .with_param("method", "put");

        let result = dispatcher
            .execute_action(&action, &rule(), &json!({}), &ExecutionContext::new())
            .await;
        assert!(result.success);
        assert_eq!(result.result.unwrap()["status"], json!(204));
    }
}
