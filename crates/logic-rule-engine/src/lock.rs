//! 实体级互斥
//!
//! 启用后，同一实体 (entity_type, entity_id) 上的并发引擎运行被串行化，
//! 避免两次并发调用同时触发同一规则而重复执行动作。没有实体 ID 的调用不加锁。
//!
//! 锁只在进程内有效。

use crate::models::ExecutionContext;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// 超过该数量时清理空闲锁
const PRUNE_THRESHOLD: usize = 1024;

/// 实体锁表
#[derive(Default)]
pub struct EntityLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取上下文实体的锁；上下文没有实体 ID 时返回 `None`
    pub async fn acquire(&self, context: &ExecutionContext) -> Option<OwnedMutexGuard<()>> {
        let key = Self::key(context)?;

        if self.locks.len() > PRUNE_THRESHOLD {
            self.prune_idle();
        }

        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        debug!(entity = %key, "等待实体锁");
        Some(mutex.lock_owned().await)
    }

    /// 移除无人持有也无人等待的锁
    pub fn prune_idle(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    fn key(context: &ExecutionContext) -> Option<String> {
        let entity_id = context.entity_id.as_deref()?;
        let entity_type = context.entity_type.as_deref().unwrap_or("*");
        Some(format!("{}:{}", entity_type, entity_id))
    }
}
