//! 外部协作存储
//!
//! 规则库、事件库和活动日志都以 trait 的形式注入引擎，
//! 每个 trait 提供内存实现（测试和无数据库部署）与 PostgreSQL 实现。

pub mod activity;
pub mod cache;
pub mod incident;
pub mod postgres;

pub use activity::{Activity, ActivityLog, InMemoryActivityLog, NewActivity};
pub use cache::CachedRuleRepository;
pub use incident::{InMemoryIncidentStore, Incident, IncidentStore, NewIncident};
pub use postgres::{PgActivityLog, PgIncidentStore, PgRuleRepository, run_migrations};

#[cfg(test)]
pub use activity::MockActivityLog;
#[cfg(test)]
pub use incident::MockIncidentStore;

use crate::error::StoreError;
use crate::models::{ExecutionContext, RuleRecord};
use async_trait::async_trait;
use dashmap::DashMap;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// 规则查询条件
///
/// 只返回启用的规则；实体类型/实体 ID 为 `None` 表示不按该维度过滤，
/// 设置时匹配相同取值或未限定（全局）的规则。
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RuleFilter {
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
}

impl RuleFilter {
    pub fn from_context(context: &ExecutionContext) -> Self {
        Self {
            entity_type: context.entity_type.clone(),
            entity_id: context.entity_id.clone(),
        }
    }

    pub fn matches(&self, record: &RuleRecord) -> bool {
        record.is_active
            && Self::scope_matches(self.entity_type.as_deref(), record.entity_type.as_deref())
            && Self::scope_matches(self.entity_id.as_deref(), record.entity_id.as_deref())
    }

    fn scope_matches(wanted: Option<&str>, scope: Option<&str>) -> bool {
        match (wanted, scope) {
            (None, _) | (_, None) => true,
            (Some(w), Some(s)) => w == s,
        }
    }
}

/// 按执行顺序排序：优先级降序，同优先级时创建时间降序（新规则优先）
pub fn sort_by_priority(records: &mut [RuleRecord]) {
    records.sort_by(|a, b| match b.priority.cmp(&a.priority) {
        Ordering::Equal => b.created_at.cmp(&a.created_at),
        other => other,
    });
}

/// 规则仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// 查询匹配的启用规则
    async fn find_rules(&self, filter: &RuleFilter) -> StoreResult<Vec<RuleRecord>>;
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<RuleRecord>>;
    async fn save_rule(&self, record: RuleRecord) -> StoreResult<()>;
    /// 删除规则，返回是否存在
    async fn delete_rule(&self, id: &str) -> StoreResult<bool>;
}

/// 内存规则仓储
#[derive(Clone, Default)]
pub struct InMemoryRuleRepository {
    rules: Arc<DashMap<String, RuleRecord>>,
}

impl InMemoryRuleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用一组规则初始化
    pub fn with_rules(records: impl IntoIterator<Item = RuleRecord>) -> Self {
        let repo = Self::new();
        for record in records {
            repo.rules.insert(record.id.clone(), record);
        }
        repo
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[async_trait]
impl RuleRepository for InMemoryRuleRepository {
    #[instrument(skip(self))]
    async fn find_rules(&self, filter: &RuleFilter) -> StoreResult<Vec<RuleRecord>> {
        let mut records: Vec<RuleRecord> = self
            .rules
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        sort_by_priority(&mut records);

        debug!(count = records.len(), "查询到匹配规则");
        Ok(records)
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<RuleRecord>> {
        Ok(self.rules.get(id).map(|entry| entry.value().clone()))
    }

    #[instrument(skip(self, record), fields(rule_id = %record.id))]
    async fn save_rule(&self, record: RuleRecord) -> StoreResult<()> {
        self.rules.insert(record.id.clone(), record);
        info!("规则已保存");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_rule(&self, id: &str) -> StoreResult<bool> {
        let removed = self.rules.remove(id).is_some();
        if removed {
            info!("规则已删除");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Rule;
    use chrono::{Duration, Utc};

    fn record(id: &str, priority: i32, entity_type: Option<&str>, entity_id: Option<&str>) -> RuleRecord {
        let mut rule = Rule::new(id).with_id(id).with_priority(priority);
        rule.entity_type = entity_type.map(str::to_string);
        rule.entity_id = entity_id.map(str::to_string);
        RuleRecord::from(rule)
    }

    #[test]
    fn test_filter_matches_scope() {
        let filter = RuleFilter {
            entity_type: Some("mission".to_string()),
            entity_id: Some("m-1".to_string()),
        };

        assert!(filter.matches(&record("global", 0, None, None)));
        assert!(filter.matches(&record("type", 0, Some("mission"), None)));
        assert!(filter.matches(&record("exact", 0, Some("mission"), Some("m-1"))));
        assert!(!filter.matches(&record("other-type", 0, Some("incident"), None)));
        assert!(!filter.matches(&record("other-id", 0, Some("mission"), Some("m-2"))));

        let mut inactive = record("inactive", 0, None, None);
        inactive.is_active = false;
        assert!(!filter.matches(&inactive));
    }

    #[test]
    fn test_empty_filter_matches_all_active() {
        let filter = RuleFilter::default();
        assert!(filter.matches(&record("a", 0, Some("incident"), Some("i-9"))));
    }

    #[test]
    fn test_sort_priority_then_newest() {
        let now = Utc::now();
        let mut old = record("old", 10, None, None);
        old.created_at = now - Duration::hours(1);
        let mut new = record("new", 10, None, None);
        new.created_at = now;
        let high = record("high", 50, None, None);

        let mut records = vec![old, high, new];
        sort_by_priority(&mut records);
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "new", "old"]);
    }

    #[tokio::test]
    async fn test_in_memory_repository() {
        let repo = InMemoryRuleRepository::with_rules(vec![
            record("a", 1, Some("mission"), None),
            record("b", 5, None, None),
            record("c", 9, Some("incident"), None),
        ]);
        assert_eq!(repo.len(), 3);

        let filter = RuleFilter {
            entity_type: Some("mission".to_string()),
            entity_id: None,
        };
        let found = repo.find_rules(&filter).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        assert!(repo.find_by_id("c").await.unwrap().is_some());
        assert!(repo.delete_rule("c").await.unwrap());
        assert!(!repo.delete_rule("c").await.unwrap());
        assert!(repo.find_by_id("c").await.unwrap().is_none());
    }
}
