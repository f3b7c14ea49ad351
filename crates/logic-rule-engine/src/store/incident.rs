//! 事件（incident）存储

use super::StoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// 待创建的事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIncident {
    pub title: String,
    pub description: Option<String>,
    pub severity: String,
    pub status: String,
    pub source_type: String,
    pub tags: Vec<String>,
    pub created_by: String,
    pub mission_id: Option<String>,
    pub assigned_to: Option<String>,
}

/// 已创建的事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub severity: String,
    pub status: String,
    pub source_type: String,
    pub tags: Vec<String>,
    pub created_by: String,
    pub mission_id: Option<String>,
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Incident {
    pub fn from_new(id: String, incident: NewIncident, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: incident.title,
            description: incident.description,
            severity: incident.severity,
            status: incident.status,
            source_type: incident.source_type,
            tags: incident.tags,
            created_by: incident.created_by,
            mission_id: incident.mission_id,
            assigned_to: incident.assigned_to,
            created_at,
        }
    }
}

/// 事件存储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IncidentStore: Send + Sync {
    async fn create_incident(&self, incident: NewIncident) -> StoreResult<Incident>;
}

/// 内存事件存储
#[derive(Clone, Default)]
pub struct InMemoryIncidentStore {
    incidents: Arc<RwLock<Vec<Incident>>>,
}

impl InMemoryIncidentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已创建的全部事件（按创建顺序）
    pub fn list(&self) -> Vec<Incident> {
        self.incidents.read().clone()
    }

    pub fn len(&self) -> usize {
        self.incidents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.incidents.read().is_empty()
    }
}

#[async_trait]
impl IncidentStore for InMemoryIncidentStore {
    async fn create_incident(&self, incident: NewIncident) -> StoreResult<Incident> {
        let created = Incident::from_new(Uuid::now_v7().to_string(), incident, Utc::now());
        info!(incident_id = %created.id, title = %created.title, "事件已创建");

        self.incidents.write().push(created.clone());
        Ok(created)
    }
}
