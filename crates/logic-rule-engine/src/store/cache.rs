//! 规则查询缓存
//!
//! 包装任意 `RuleRepository`，按 (实体类型, 实体 ID) 缓存查询结果。
//!
//! ## 缓存刷新策略
//!
//! 条目超过 TTL 后重新查询，过期条目在未命中时移除；缓存条目数超过阈值时
//! 会整体清理一次过期条目。经由本仓储的保存/删除会清空整个缓存；
//! 绕过本仓储修改规则时，需调用 `invalidate_all()`。

use super::{RuleFilter, RuleRepository, StoreResult};
use crate::models::RuleRecord;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// 缓存条目：写入时间和查询结果
type CacheEntry = (Instant, Vec<RuleRecord>);

/// 超过该数量时清理过期条目
const SWEEP_THRESHOLD: usize = 1024;

/// 带 TTL 的规则仓储缓存
pub struct CachedRuleRepository<R> {
    inner: R,
    entries: DashMap<RuleFilter, CacheEntry>,
    ttl: Duration,
}

impl<R: RuleRepository> CachedRuleRepository<R> {
    pub fn new(inner: R, ttl: Duration) -> Self {
        Self {
            inner,
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn with_ttl_seconds(inner: R, ttl_seconds: u64) -> Self {
        Self::new(inner, Duration::from_secs(ttl_seconds))
    }

    /// 清空全部缓存
    pub fn invalidate_all(&self) {
        self.entries.clear();
        debug!("规则缓存已清空");
    }

    /// 当前缓存的查询数量（用于监控）
    pub fn cached_queries(&self) -> usize {
        self.entries.len()
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// 移除所有过期条目
    pub fn evict_expired(&self) {
        let before = self.entries.len();
        self.entries
            .retain(|_, (stored_at, _)| stored_at.elapsed() <= self.ttl);
        debug!(evicted = before.saturating_sub(self.entries.len()), "清理过期规则缓存");
    }

    fn lookup(&self, filter: &RuleFilter) -> Option<Vec<RuleRecord>> {
        if let Some(entry) = self.entries.get(filter) {
            let (stored_at, records) = entry.value();
            if stored_at.elapsed() <= self.ttl {
                return Some(records.clone());
            }
        }

        self.entries
            .remove_if(filter, |_, (stored_at, _)| stored_at.elapsed() > self.ttl);
        None
    }
}

#[async_trait]
impl<R: RuleRepository> RuleRepository for CachedRuleRepository<R> {
    async fn find_rules(&self, filter: &RuleFilter) -> StoreResult<Vec<RuleRecord>> {
        if let Some(records) = self.lookup(filter) {
            debug!(count = records.len(), "规则缓存命中");
            return Ok(records);
        }

        let records = self.inner.find_rules(filter).await?;
        if self.entries.len() > SWEEP_THRESHOLD {
            self.evict_expired();
        }
        self.entries
            .insert(filter.clone(), (Instant::now(), records.clone()));
        Ok(records)
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<RuleRecord>> {
        self.inner.find_by_id(id).await
    }

    async fn save_rule(&self, record: RuleRecord) -> StoreResult<()> {
        let result = self.inner.save_rule(record).await;
        self.invalidate_all();
        result
    }

    async fn delete_rule(&self, id: &str) -> StoreResult<bool> {
        let result = self.inner.delete_rule(id).await;
        self.invalidate_all();
        result
    }
}
