//! 各动作类型的处理逻辑
//!
//! 参数先经 serde 解析为强类型结构，类型不符时返回 `ActionError::InvalidParameter`。
//! 接入了外部存储的动作执行真实写入，其余动作返回描述预期效果的结构化结果。

use super::ActionDispatcher;
use super::webhook::WebhookRequest;
use crate::error::{ActionError, StoreError};
use crate::models::{Action, ExecutionContext, Rule};
use crate::resolver::FieldResolver;
use crate::store::{NewActivity, NewIncident};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

const DEFAULT_PRIORITY: &str = "medium";
const DEFAULT_EVENT_SEVERITY: &str = "info";
const DEFAULT_WEBHOOK_METHOD: &str = "POST";
const DEFAULT_MISSION_ACTION: &str = "start";

fn default_priority() -> String {
    DEFAULT_PRIORITY.to_string()
}

/// 将动作参数解析为强类型结构
fn params<T: DeserializeOwned>(action: &Action) -> Result<T, ActionError> {
    serde_json::from_value(Value::Object(action.parameters.clone())).map_err(|e| {
        ActionError::InvalidParameter {
            action: action.kind.to_string(),
            reason: e.to_string(),
        }
    })
}

/// 动作作用的实体：优先取上下文中的实体，其次是规则限定的实体，最后落到规则本身
fn subject(rule: &Rule, context: &ExecutionContext) -> (String, String) {
    if let (Some(entity_type), Some(entity_id)) = (&context.entity_type, &context.entity_id) {
        return (entity_type.clone(), entity_id.clone());
    }
    if let (Some(entity_type), Some(entity_id)) = (&rule.entity_type, &rule.entity_id) {
        return (entity_type.clone(), entity_id.clone());
    }
    ("logic_rule".to_string(), rule.id.clone())
}

fn actor(context: &ExecutionContext) -> String {
    context
        .user_id
        .clone()
        .unwrap_or_else(|| "system".to_string())
}

fn actor_name(rule: &Rule) -> Option<String> {
    Some(format!("Logic rule: {}", rule.name))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotifyAgentParams {
    agent_id: String,
    message: Option<String>,
    #[serde(default = "default_priority")]
    priority: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateIncidentParams {
    title: String,
    severity: String,
    description: Option<String>,
    assigned_to: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlagEntityParams {
    flag_type: String,
    reason: Option<String>,
    #[serde(default = "default_priority")]
    priority: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateFieldParams {
    field: String,
    value: Value,
    reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TriggerMissionParams {
    mission_id: String,
    action_type: Option<String>,
    #[serde(default)]
    parameters: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailParams {
    recipient: String,
    subject: String,
    template: Option<String>,
    #[serde(default)]
    attachments: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookParams {
    url: String,
    method: Option<String>,
    #[serde(default)]
    headers: Map<String, Value>,
    #[serde(default)]
    payload: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogEventParams {
    event_type: String,
    #[serde(default)]
    details: Value,
    severity: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EscalateParams {
    escalation_level: Value,
    reason: Option<String>,
    assigned_to: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignTaskParams {
    assigned_to: String,
    task_title: String,
    description: Option<String>,
    due_date: Option<String>,
    #[serde(default = "default_priority")]
    priority: String,
}

impl ActionDispatcher {
    pub(super) fn notify_agent(
        &self,
        action: &Action,
        rule: &Rule,
    ) -> Result<Value, ActionError> {
        let p: NotifyAgentParams = params(action)?;
        let message = p
            .message
            .unwrap_or_else(|| format!("Rule '{}' was triggered", rule.name));

        Ok(json!({
            "agentId": p.agent_id,
            "message": message,
            "priority": p.priority,
            "status": "queued",
        }))
    }

    pub(super) async fn create_incident(
        &self,
        action: &Action,
        rule: &Rule,
        context: &ExecutionContext,
    ) -> Result<Value, ActionError> {
        let p: CreateIncidentParams = params(action)?;
        let description = p
            .description
            .unwrap_or_else(|| format!("Created automatically by logic rule '{}'", rule.name));

        let incident = self
            .incidents
            .create_incident(NewIncident {
                title: p.title,
                description: Some(description),
                severity: p.severity,
                status: "open".to_string(),
                source_type: "logic_rule".to_string(),
                tags: vec!["logic-rule".to_string(), rule.id.clone()],
                created_by: context
                    .user_id
                    .clone()
                    .unwrap_or_else(|| rule.created_by.clone()),
                mission_id: context.mission_id.clone(),
                assigned_to: p.assigned_to,
            })
            .await?;

        serde_json::to_value(incident).map_err(|e| ActionError::Store(StoreError::from(e)))
    }

    pub(super) async fn flag_entity(
        &self,
        action: &Action,
        rule: &Rule,
        context: &ExecutionContext,
    ) -> Result<Value, ActionError> {
        let p: FlagEntityParams = params(action)?;
        let (entity_type, entity_id) = subject(rule, context);
        let reason = p
            .reason
            .unwrap_or_else(|| format!("Flagged by logic rule '{}'", rule.name));

        let activity = self
            .activity_log
            .record(NewActivity {
                entity_type,
                entity_id,
                action: "entity_flagged".to_string(),
                actor: actor(context),
                actor_name: actor_name(rule),
                description: reason.clone(),
                metadata: json!({
                    "flagType": p.flag_type,
                    "priority": p.priority,
                    "ruleId": rule.id,
                }),
            })
            .await?;

        Ok(json!({
            "flagType": p.flag_type,
            "reason": reason,
            "priority": p.priority,
            "activityId": activity.id,
        }))
    }

    /// 只描述字段变更，引擎本身从不写业务数据
    pub(super) fn update_field(
        &self,
        action: &Action,
        data: &Value,
        context: &ExecutionContext,
    ) -> Result<Value, ActionError> {
        let p: UpdateFieldParams = params(action)?;
        let previous = FieldResolver::resolve(&p.field, data, context)
            .cloned()
            .unwrap_or(Value::Null);

        Ok(json!({
            "field": p.field,
            "value": p.value,
            "previousValue": previous,
            "reason": p.reason,
        }))
    }

    pub(super) fn trigger_mission(&self, action: &Action) -> Result<Value, ActionError> {
        let p: TriggerMissionParams = params(action)?;

        Ok(json!({
            "missionId": p.mission_id,
            "actionType": p.action_type.unwrap_or_else(|| DEFAULT_MISSION_ACTION.to_string()),
            "parameters": p.parameters,
            "status": "triggered",
        }))
    }

    pub(super) fn send_email(&self, action: &Action) -> Result<Value, ActionError> {
        let p: SendEmailParams = params(action)?;

        Ok(json!({
            "recipient": p.recipient,
            "subject": p.subject,
            "template": p.template,
            "attachments": p.attachments,
            "status": "queued",
        }))
    }

    pub(super) async fn webhook(&self, action: &Action) -> Result<Value, ActionError> {
        let p: WebhookParams = params(action)?;
        let method = p
            .method
            .unwrap_or_else(|| DEFAULT_WEBHOOK_METHOD.to_string())
            .to_ascii_uppercase();

        let Some(client) = &self.webhook else {
            return Ok(json!({
                "url": p.url,
                "method": method,
                "headers": p.headers,
                "payload": p.payload,
                "status": "not_sent",
            }));
        };

        let response = client
            .send(WebhookRequest {
                url: p.url.clone(),
                method: method.clone(),
                headers: p.headers,
                payload: p.payload,
            })
            .await?;

        Ok(json!({
            "url": p.url,
            "method": method,
            "status": response.status,
        }))
    }

    pub(super) async fn log_event(
        &self,
        action: &Action,
        rule: &Rule,
        context: &ExecutionContext,
    ) -> Result<Value, ActionError> {
        let p: LogEventParams = params(action)?;
        let (entity_type, entity_id) = subject(rule, context);
        let severity = p
            .severity
            .unwrap_or_else(|| DEFAULT_EVENT_SEVERITY.to_string());

        let activity = self
            .activity_log
            .record(NewActivity {
                entity_type,
                entity_id,
                action: p.event_type.clone(),
                actor: actor(context),
                actor_name: actor_name(rule),
                description: format!("Event '{}' logged by rule '{}'", p.event_type, rule.name),
                metadata: json!({
                    "details": p.details,
                    "severity": severity,
                    "ruleId": rule.id,
                }),
            })
            .await?;

        serde_json::to_value(activity).map_err(|e| ActionError::Store(StoreError::from(e)))
    }

    pub(super) async fn escalate(
        &self,
        action: &Action,
        rule: &Rule,
        context: &ExecutionContext,
    ) -> Result<Value, ActionError> {
        let p: EscalateParams = params(action)?;
        let (entity_type, entity_id) = subject(rule, context);
        let reason = p
            .reason
            .unwrap_or_else(|| format!("Escalated by logic rule '{}'", rule.name));

        let activity = self
            .activity_log
            .record(NewActivity {
                entity_type,
                entity_id,
                action: "escalated".to_string(),
                actor: actor(context),
                actor_name: actor_name(rule),
                description: reason.clone(),
                metadata: json!({
                    "escalationLevel": p.escalation_level,
                    "assignedTo": p.assigned_to,
                    "ruleId": rule.id,
                }),
            })
            .await?;

        Ok(json!({
            "escalationLevel": p.escalation_level,
            "reason": reason,
            "assignedTo": p.assigned_to,
            "activityId": activity.id,
        }))
    }

    pub(super) fn assign_task(&self, action: &Action) -> Result<Value, ActionError> {
        let p: AssignTaskParams = params(action)?;

        Ok(json!({
            "assignedTo": p.assigned_to,
            "taskTitle": p.task_title,
            "description": p.description,
            "dueDate": p.due_date,
            "priority": p.priority,
            "status": "assigned",
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActionKind;

    #[test]
    fn test_subject_prefers_context_entity() {
        let rule = Rule::new("r").scoped_to("mission", Some("m-9".to_string()));
        let ctx = ExecutionContext::for_entity("incident", "i-1");
        assert_eq!(subject(&rule, &ctx), ("incident".to_string(), "i-1".to_string()));
        assert_eq!(
            subject(&rule, &ExecutionContext::new()),
            ("mission".to_string(), "m-9".to_string())
        );

        let global = Rule::new("g").with_id("g-1");
        assert_eq!(
            subject(&global, &ExecutionContext::new()),
            ("logic_rule".to_string(), "g-1".to_string())
        );
    }

    #[test]
    fn test_params_type_mismatch_is_invalid_parameter() {
        let action = Action::new(ActionKind::SendEmail)
            .with_param("recipient", 42)
            .with_param("subject", "hi");
        let err = params::<SendEmailParams>(&action).err().unwrap();
        assert!(matches!(err, ActionError::InvalidParameter { .. }));
    }

    #[test]
    fn test_defaults_applied() {
        let action = Action::new(ActionKind::AssignTask)
            .with_param("assignedTo", "ops")
            .with_param("taskTitle", "Review");
        let p: AssignTaskParams = params(&action).unwrap();
        assert_eq!(p.priority, DEFAULT_PRIORITY);
        assert!(p.due_date.is_none());
    }
}
