//! 规则试运行
//!
//! 与正式运行不同，试运行逐一评估并报告每个条件，不做短路，
//! 便于规则作者看到具体哪些条件通过。规则触发时动作会真实执行。

use crate::engine::LogicEngine;
use crate::executor::RuleExecutor;
use crate::models::{ExecutionContext, Rule, TestRuleResult};
use serde_json::Value;
use tracing::{info, instrument};

impl LogicEngine {
    /// 试运行单条规则
    #[instrument(skip(self, rule, data, context), fields(rule_id = %rule.id))]
    pub async fn test_rule(
        &self,
        rule: &Rule,
        data: &Value,
        context: &ExecutionContext,
    ) -> TestRuleResult {
        let condition_results = self.executor().evaluate_each(rule, data, context);
        let triggered = RuleExecutor::combine(rule.logic_type, &condition_results);

        let action_results = if triggered {
            let mut results = Vec::with_capacity(rule.actions.len());
            for action in &rule.actions {
                results.push(
                    self.dispatcher()
                        .execute_action(action, rule, data, context)
                        .await,
                );
            }
            Some(results)
        } else {
            None
        };

        info!(
            triggered,
            conditions = condition_results.len(),
            passed = condition_results.iter().filter(|r| r.result).count(),
            "规则试运行完成"
        );

        TestRuleResult {
            triggered,
            condition_results,
            action_results,
        }
    }
}
