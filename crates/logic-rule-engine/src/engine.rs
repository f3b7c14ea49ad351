//! 引擎编排
//!
//! 选择规则 → 逐条评估 → 触发动作 → 汇总结果。
//!
//! 一次运行内严格串行：规则按优先级顺序处理，动作按声明顺序执行，
//! 这两个顺序同时也是 `EngineResult::action_results` 的报告顺序。
//! 运行不会因任何单条规则或单个动作失败而中断，失败信息汇总在结果中返回。

use crate::actions::ActionDispatcher;
use crate::compiler::RuleCompiler;
use crate::error::RuleError;
use crate::executor::RuleExecutor;
use crate::lock::EntityLocks;
use crate::models::{EngineResult, ExecutionContext, Rule, RuleRecord};
use crate::store::{RuleFilter, RuleRepository, StoreResult, sort_by_priority};
use logic_shared::observability::metrics::record_engine_run;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// 引擎选项
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineOptions {
    /// 串行化同一实体上的并发运行
    pub serialize_per_entity: bool,
}

/// 逻辑规则引擎
pub struct LogicEngine {
    rules: Arc<dyn RuleRepository>,
    dispatcher: ActionDispatcher,
    compiler: RuleCompiler,
    executor: RuleExecutor,
    locks: Option<EntityLocks>,
}

impl LogicEngine {
    pub fn new(rules: Arc<dyn RuleRepository>, dispatcher: ActionDispatcher) -> Self {
        Self {
            rules,
            dispatcher,
            compiler: RuleCompiler::new(),
            executor: RuleExecutor::new(),
            locks: None,
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.locks = options.serialize_per_entity.then(EntityLocks::new);
        self
    }

    pub fn rules(&self) -> &Arc<dyn RuleRepository> {
        &self.rules
    }

    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.dispatcher
    }

    pub(crate) fn executor(&self) -> &RuleExecutor {
        &self.executor
    }

    /// 获取与上下文相关的启用规则，按执行顺序排列
    #[instrument(skip(self, context), fields(entity_type = ?context.entity_type, entity_id = ?context.entity_id))]
    pub async fn get_relevant_rules(
        &self,
        context: &ExecutionContext,
    ) -> StoreResult<Vec<RuleRecord>> {
        let filter = RuleFilter::from_context(context);
        let mut records = self.rules.find_rules(&filter).await?;

        // 仓储实现不一定保证过滤和排序
        records.retain(|r| filter.matches(r));
        sort_by_priority(&mut records);

        Ok(records)
    }

    /// 评估规则的全部条件（短路）
    pub fn evaluate_rule(&self, rule: &Rule, data: &Value, context: &ExecutionContext) -> bool {
        self.executor.evaluate_rule(rule, data, context)
    }

    /// 运行所有适用规则
    ///
    /// 提供 `custom_rules` 时使用调用方给出的规则（仍只处理启用的规则），
    /// 否则从规则仓储中按上下文选择。
    #[instrument(
        skip(self, data, context, custom_rules),
        fields(entity_type = ?context.entity_type, entity_id = ?context.entity_id)
    )]
    pub async fn run_logic_rules(
        &self,
        data: &Value,
        context: &ExecutionContext,
        custom_rules: Option<Vec<RuleRecord>>,
    ) -> EngineResult {
        let start = Instant::now();
        let mut result = EngineResult::default();

        let _entity_guard = match &self.locks {
            Some(locks) => locks.acquire(context).await,
            None => None,
        };

        let records = match custom_rules {
            Some(mut records) => {
                records.retain(|r| r.is_active);
                sort_by_priority(&mut records);
                records
            }
            None => match self.get_relevant_rules(context).await {
                Ok(records) => records,
                Err(e) => {
                    error!(error = %e, "加载规则失败");
                    result.errors.push(format!("Failed to load rules: {}", e));
                    return Self::finish(result, start);
                }
            },
        };

        result.total_rules_evaluated = records.len();

        for record in &records {
            if let Err(e) = self.process_rule(record, data, context, &mut result).await {
                warn!(rule_id = %record.id, error = %e, "规则处理失败，继续处理其他规则");
                result
                    .errors
                    .push(format!("Rule {} ({}): {}", record.name, record.id, e));
            }
        }

        Self::finish(result, start)
    }

    /// 处理单条规则：解析、评估、触发时依次执行全部动作
    async fn process_rule(
        &self,
        record: &RuleRecord,
        data: &Value,
        context: &ExecutionContext,
        result: &mut EngineResult,
    ) -> Result<(), RuleError> {
        let rule = self.compiler.compile(record)?;

        if !self.executor.evaluate_rule(&rule, data, context) {
            return Ok(());
        }

        info!(rule_id = %rule.id, rule_name = %rule.name, actions = rule.actions.len(), "规则已触发");
        result.rules_triggered += 1;

        for action in &rule.actions {
            let action_result = self
                .dispatcher
                .execute_action(action, &rule, data, context)
                .await;
            result.action_results.push(action_result);
            result.actions_executed += 1;
        }

        Ok(())
    }

    fn finish(mut result: EngineResult, start: Instant) -> EngineResult {
        let elapsed = start.elapsed();
        result.execution_time_ms = elapsed.as_millis() as u64;

        record_engine_run(
            result.total_rules_evaluated,
            result.rules_triggered,
            result.errors.len(),
            elapsed.as_secs_f64(),
        );

        info!(
            rules_evaluated = result.total_rules_evaluated,
            rules_triggered = result.rules_triggered,
            actions_executed = result.actions_executed,
            errors = result.errors.len(),
            elapsed_ms = result.execution_time_ms,
            "规则引擎运行完成"
        );

        result
    }
}
