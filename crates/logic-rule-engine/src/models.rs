//! 规则引擎领域模型

use crate::operators::{LogicType, Operator};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use uuid::Uuid;

fn default_true() -> bool {
    true
}

fn default_logic_type() -> String {
    LogicType::And.to_string()
}

/// 规则定义（已解析的强类型形式）
///
/// 引擎只读取规则，从不修改。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub logic_type: LogicType,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub created_by: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: None,
            entity_type: None,
            entity_id: None,
            conditions: Vec::new(),
            actions: Vec::new(),
            logic_type: LogicType::And,
            is_active: true,
            priority: 0,
            created_by: "system".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_logic(mut self, logic_type: LogicType) -> Self {
        self.logic_type = logic_type;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// 限定规则作用的实体类型和实体 ID
    pub fn scoped_to(mut self, entity_type: impl Into<String>, entity_id: Option<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = entity_id;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// 存储中的规则记录
///
/// 条件和动作以不透明的 JSON 保存，由 `RuleCompiler` 在加载时解析为 `Rule`。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub conditions: Value,
    #[serde(default)]
    pub actions: Value,
    #[serde(default = "default_logic_type")]
    pub logic_type: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub created_by: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl From<&Rule> for RuleRecord {
    fn from(rule: &Rule) -> Self {
        Self {
            id: rule.id.clone(),
            name: rule.name.clone(),
            description: rule.description.clone(),
            entity_type: rule.entity_type.clone(),
            entity_id: rule.entity_id.clone(),
            conditions: Value::Array(rule.conditions.iter().map(Condition::to_value).collect()),
            actions: Value::Array(rule.actions.iter().map(Action::to_value).collect()),
            logic_type: rule.logic_type.to_string(),
            is_active: rule.is_active,
            priority: rule.priority,
            created_by: rule.created_by.clone(),
            created_at: rule.created_at,
            updated_at: rule.updated_at,
        }
    }
}

impl From<Rule> for RuleRecord {
    fn from(rule: Rule) -> Self {
        Self::from(&rule)
    }
}

/// 条件声明的数据类型，仅供编辑工具使用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    String,
    Number,
    Boolean,
    Date,
    Array,
}

/// 条件：字段值与字面量之间的一次比较
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
            data_type: None,
        }
    }

    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    pub fn to_value(&self) -> Value {
        let mut value = json!({
            "field": self.field,
            "operator": self.operator.as_str(),
            "value": self.value,
        });
        if let (Some(data_type), Some(map)) = (self.data_type, value.as_object_mut()) {
            map.insert("dataType".to_string(), json!(data_type));
        }
        value
    }
}

/// 动作类型（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    NotifyAgent,
    CreateIncident,
    FlagEntity,
    UpdateField,
    TriggerMission,
    SendEmail,
    Webhook,
    LogEvent,
    Escalate,
    AssignTask,
}

impl ActionKind {
    pub const ALL: [ActionKind; 10] = [
        Self::NotifyAgent,
        Self::CreateIncident,
        Self::FlagEntity,
        Self::UpdateField,
        Self::TriggerMission,
        Self::SendEmail,
        Self::Webhook,
        Self::LogEvent,
        Self::Escalate,
        Self::AssignTask,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotifyAgent => "notify_agent",
            Self::CreateIncident => "create_incident",
            Self::FlagEntity => "flag_entity",
            Self::UpdateField => "update_field",
            Self::TriggerMission => "trigger_mission",
            Self::SendEmail => "send_email",
            Self::Webhook => "webhook",
            Self::LogEvent => "log_event",
            Self::Escalate => "escalate",
            Self::AssignTask => "assign_task",
        }
    }

    /// 各动作的必需参数
    pub fn required_parameters(&self) -> &'static [&'static str] {
        match self {
            Self::NotifyAgent => &["agentId"],
            Self::CreateIncident => &["title", "severity"],
            Self::FlagEntity => &["flagType"],
            Self::UpdateField => &["field", "value"],
            Self::TriggerMission => &["missionId"],
            Self::SendEmail => &["recipient", "subject"],
            Self::Webhook => &["url"],
            Self::LogEvent => &["eventType"],
            Self::Escalate => &["escalationLevel"],
            Self::AssignTask => &["assignedTo", "taskTitle"],
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 动作：规则触发后执行的副作用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            parameters: Map::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn to_value(&self) -> Value {
        json!({
            "type": self.kind.as_str(),
            "parameters": self.parameters,
        })
    }
}

/// 执行上下文：实体标识等环境信息，metadata 作为字段解析的第二数据源
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub mission_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_entity(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: Some(entity_type.into()),
            entity_id: Some(entity_id.into()),
            ..Default::default()
        }
    }

    pub fn with_mission(mut self, mission_id: impl Into<String>) -> Self {
        self.mission_id = Some(mission_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// 单个动作的执行结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub action: Action,
    pub rule_id: String,
    pub rule_name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub executed_at: DateTime<Utc>,
}

impl ActionResult {
    pub fn succeeded(action: &Action, rule: &Rule, result: Value) -> Self {
        Self {
            action: action.clone(),
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            success: true,
            result: Some(result),
            error: None,
            executed_at: Utc::now(),
        }
    }

    pub fn failed(action: &Action, rule: &Rule, error: impl Into<String>) -> Self {
        Self {
            action: action.clone(),
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            success: false,
            result: None,
            error: Some(error.into()),
            executed_at: Utc::now(),
        }
    }
}

/// 一次引擎运行的汇总结果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineResult {
    pub total_rules_evaluated: usize,
    pub rules_triggered: usize,
    pub actions_executed: usize,
    pub action_results: Vec<ActionResult>,
    pub execution_time_ms: u64,
    pub errors: Vec<String>,
}

/// 试运行中单个条件的结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionResult {
    pub condition: Condition,
    pub result: bool,
}

/// 试运行结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRuleResult {
    pub triggered: bool,
    pub condition_results: Vec<ConditionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_results: Option<Vec<ActionResult>>,
}
