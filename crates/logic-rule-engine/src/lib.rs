//! 逻辑规则引擎
//!
//! 将结构化业务数据与存储中的条件/动作规则进行匹配，并分发带副作用的动作：
//! - 字段解析与操作符表
//! - 条件/规则评估（AND/OR 短路）
//! - 按实体选择规则并按优先级排序
//! - 封闭动作集合的分发与失败隔离
//! - 规则试运行
//! - HTTP 调用层

pub mod actions;
pub mod api;
pub mod compiler;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod lock;
pub mod models;
pub mod operators;
pub mod resolver;
pub mod samples;
pub mod service;
pub mod store;
mod tester;

pub use actions::ActionDispatcher;
pub use compiler::RuleCompiler;
pub use engine::{EngineOptions, LogicEngine};
pub use error::{ActionError, Result, RuleError, ServiceError, StoreError};
pub use evaluator::ConditionEvaluator;
pub use executor::RuleExecutor;
pub use models::{
    Action, ActionKind, ActionResult, Condition, ConditionResult, DataType, EngineResult,
    ExecutionContext, Rule, RuleRecord, TestRuleResult,
};
pub use operators::{LogicType, Operator};
pub use resolver::FieldResolver;
pub use service::{LogicService, RunRulesRequest, TestRuleRequest};
