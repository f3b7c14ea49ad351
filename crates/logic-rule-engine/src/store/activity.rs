//! 活动日志

use super::StoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// 待写入的活动记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivity {
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub actor: String,
    pub actor_name: Option<String>,
    pub description: String,
    pub metadata: Value,
}

/// 已写入的活动记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub actor: String,
    pub actor_name: Option<String>,
    pub description: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl Activity {
    pub fn from_new(id: String, activity: NewActivity, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            entity_type: activity.entity_type,
            entity_id: activity.entity_id,
            action: activity.action,
            actor: activity.actor,
            actor_name: activity.actor_name,
            description: activity.description,
            metadata: activity.metadata,
            created_at,
        }
    }
}

/// 活动日志接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn record(&self, activity: NewActivity) -> StoreResult<Activity>;
}

/// 内存活动日志
#[derive(Clone, Default)]
pub struct InMemoryActivityLog {
    entries: Arc<RwLock<Vec<Activity>>>,
}

impl InMemoryActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self) -> Vec<Activity> {
        self.entries.read().clone()
    }

    /// 按动作名筛选
    pub fn by_action(&self, action: &str) -> Vec<Activity> {
        self.entries
            .read()
            .iter()
            .filter(|a| a.action == action)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl ActivityLog for InMemoryActivityLog {
    async fn record(&self, activity: NewActivity) -> StoreResult<Activity> {
        let recorded = Activity::from_new(Uuid::now_v7().to_string(), activity, Utc::now());
        info!(
            activity_id = %recorded.id,
            entity_type = %recorded.entity_type,
            entity_id = %recorded.entity_id,
            action = %recorded.action,
            "活动已记录"
        );

        self.entries.write().push(recorded.clone());
        Ok(recorded)
    }
}
