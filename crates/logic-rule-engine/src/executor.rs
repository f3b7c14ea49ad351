//! 规则执行器
//!
//! 条件评估是第一层隔离边界：单个条件内部出错只会让该条件为 false，
//! 不会中断整条规则的评估。

use crate::evaluator::ConditionEvaluator;
use crate::models::{Condition, ConditionResult, ExecutionContext, Rule};
use crate::operators::LogicType;
use crate::resolver::FieldResolver;
use serde_json::Value;
use tracing::{debug, warn};

/// 规则执行器
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleExecutor;

impl RuleExecutor {
    pub fn new() -> Self {
        Self
    }

    /// 评估单个条件，评估错误视为不满足
    pub fn evaluate_condition(
        &self,
        cond: &Condition,
        data: &Value,
        context: &ExecutionContext,
    ) -> bool {
        let field_value = FieldResolver::resolve(&cond.field, data, context);

        match ConditionEvaluator::evaluate(field_value, &cond.operator, &cond.value) {
            Ok(matched) => {
                debug!(
                    field = %cond.field,
                    operator = %cond.operator,
                    matched,
                    "条件评估完成"
                );
                matched
            }
            Err(e) => {
                warn!(
                    field = %cond.field,
                    operator = %cond.operator,
                    error = %e,
                    "条件评估失败，按不满足处理"
                );
                false
            }
        }
    }

    /// 评估规则（短路求值）
    ///
    /// 没有条件的规则永远不会触发。
    pub fn evaluate_rule(&self, rule: &Rule, data: &Value, context: &ExecutionContext) -> bool {
        if rule.conditions.is_empty() {
            return false;
        }

        match rule.logic_type {
            // AND: 遇到 false 立即返回
            LogicType::And => rule
                .conditions
                .iter()
                .all(|c| self.evaluate_condition(c, data, context)),
            // OR: 遇到 true 立即返回
            LogicType::Or => rule
                .conditions
                .iter()
                .any(|c| self.evaluate_condition(c, data, context)),
        }
    }

    /// 逐个评估所有条件，不短路，用于试运行
    pub fn evaluate_each(
        &self,
        rule: &Rule,
        data: &Value,
        context: &ExecutionContext,
    ) -> Vec<ConditionResult> {
        rule.conditions
            .iter()
            .map(|c| ConditionResult {
                condition: c.clone(),
                result: self.evaluate_condition(c, data, context),
            })
            .collect()
    }

    /// 按逻辑类型合并已评估的条件结果
    pub fn combine(logic_type: LogicType, results: &[ConditionResult]) -> bool {
        if results.is_empty() {
            return false;
        }

        match logic_type {
            LogicType::And => results.iter().all(|r| r.result),
            LogicType::Or => results.iter().any(|r| r.result),
        }
    }
}
