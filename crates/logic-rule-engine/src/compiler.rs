//! 规则编译器
//!
//! 将存储中的规则记录（条件/动作为不透明 JSON）解析为强类型的 `Rule`，
//! 并在加载时完成结构校验。解析失败统一报告为 `RuleError::Parse`。

use crate::error::{Result, RuleError};
use crate::models::{Action, Condition, Rule, RuleRecord};
use crate::operators::{LogicType, Operator};
use serde_json::Value;
use tracing::warn;

/// 规则编译器
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleCompiler;

impl RuleCompiler {
    pub fn new() -> Self {
        Self
    }

    /// 从 JSON 字符串编译规则记录
    pub fn compile_from_json(&self, json: &str) -> Result<Rule> {
        let record: RuleRecord = serde_json::from_str(json)
            .map_err(|e| RuleError::Parse(format!("规则记录格式无效: {}", e)))?;
        self.compile(&record)
    }

    /// 编译规则记录
    pub fn compile(&self, record: &RuleRecord) -> Result<Rule> {
        if record.id.is_empty() {
            return Err(RuleError::Parse("规则 ID 不能为空".to_string()));
        }

        let logic_type = LogicType::parse(&record.logic_type).ok_or_else(|| {
            RuleError::Parse(format!("未知的逻辑类型 '{}'", record.logic_type))
        })?;

        let conditions: Vec<Condition> = Self::decode_list(&record.conditions, "conditions")?;
        for (i, cond) in conditions.iter().enumerate() {
            self.validate_condition(cond, &format!("conditions[{}]", i))?;
        }

        let actions: Vec<Action> = Self::decode_list(&record.actions, "actions")?;

        Ok(Rule {
            id: record.id.clone(),
            name: record.name.clone(),
            description: record.description.clone(),
            entity_type: record.entity_type.clone(),
            entity_id: record.entity_id.clone(),
            conditions,
            actions,
            logic_type,
            is_active: record.is_active,
            priority: record.priority,
            created_by: record.created_by.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    /// 解析 JSON 数组，null 视为空列表
    fn decode_list<T: serde::de::DeserializeOwned>(value: &Value, what: &str) -> Result<Vec<T>> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Array(_) => serde_json::from_value(value.clone())
                .map_err(|e| RuleError::Parse(format!("{} 解析失败: {}", what, e))),
            other => Err(RuleError::Parse(format!(
                "{} 必须是数组，实际为 {}",
                what, other
            ))),
        }
    }

    /// 验证条件
    fn validate_condition(&self, cond: &Condition, path: &str) -> Result<()> {
        if cond.field.trim().is_empty() {
            return Err(RuleError::Parse(format!("条件 '{}' 的字段不能为空", path)));
        }

        match &cond.operator {
            Operator::Between => {
                let valid = cond.value.as_array().is_some_and(|arr| arr.len() == 2);
                if !valid {
                    return Err(RuleError::Parse(format!(
                        "条件 '{}' 的 between 操作符需要 [min, max] 数组",
                        path
                    )));
                }
            }
            Operator::Regex => {
                let pattern = cond.value.as_str().ok_or_else(|| {
                    RuleError::Parse(format!("条件 '{}' 的 regex 操作符需要字符串值", path))
                })?;
                regex::Regex::new(pattern).map_err(|e| {
                    RuleError::Parse(format!("条件 '{}' 的正则表达式无效: {}", path, e))
                })?;
            }
            Operator::Unknown(name) => {
                // 未知操作符不阻止加载，评估时视为不满足
                warn!(condition = %path, operator = %name, "规则使用了未知的操作符");
            }
            _ => {}
        }

        Ok(())
    }
}

impl RuleRecord {
    /// 解析为强类型规则
    pub fn decode(&self) -> Result<Rule> {
        RuleCompiler::new().compile(self)
    }
}
