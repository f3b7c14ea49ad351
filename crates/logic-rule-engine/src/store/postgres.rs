//! PostgreSQL 存储实现
//!
//! 表结构见 `migrations/`，可通过 `run_migrations` 初始化。

use super::{
    Activity, ActivityLog, Incident, IncidentStore, NewActivity, NewIncident, RuleFilter,
    RuleRepository, StoreResult,
};
use crate::models::RuleRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use tracing::{info, instrument};
use uuid::Uuid;

/// 执行数据库迁移
pub async fn run_migrations(pool: &PgPool) -> StoreResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))?;
    info!("数据库迁移完成");
    Ok(())
}

/// 规则表行
#[derive(Debug, sqlx::FromRow)]
struct RuleRow {
    id: String,
    name: String,
    description: Option<String>,
    entity_type: Option<String>,
    entity_id: Option<String>,
    conditions: Value,
    actions: Value,
    logic_type: String,
    is_active: bool,
    priority: i32,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RuleRow> for RuleRecord {
    fn from(row: RuleRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            conditions: row.conditions,
            actions: row.actions,
            logic_type: row.logic_type,
            is_active: row.is_active,
            priority: row.priority,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const RULE_COLUMNS: &str = "id, name, description, entity_type, entity_id, conditions, actions, \
                            logic_type, is_active, priority, created_by, created_at, updated_at";

/// 规则仓储
pub struct PgRuleRepository {
    pool: PgPool,
}

impl PgRuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RuleRepository for PgRuleRepository {
    #[instrument(skip(self))]
    async fn find_rules(&self, filter: &RuleFilter) -> StoreResult<Vec<RuleRecord>> {
        let sql = format!(
            r#"
            SELECT {RULE_COLUMNS}
            FROM logic_rules
            WHERE is_active = TRUE
              AND ($1::TEXT IS NULL OR entity_type IS NULL OR entity_type = $1)
              AND ($2::TEXT IS NULL OR entity_id IS NULL OR entity_id = $2)
            ORDER BY priority DESC, created_at DESC
            "#
        );

        let rows = sqlx::query_as::<_, RuleRow>(&sql)
            .bind(filter.entity_type.as_deref())
            .bind(filter.entity_id.as_deref())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(RuleRecord::from).collect())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<RuleRecord>> {
        let sql = format!("SELECT {RULE_COLUMNS} FROM logic_rules WHERE id = $1");

        let row = sqlx::query_as::<_, RuleRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(RuleRecord::from))
    }

    #[instrument(skip(self, record), fields(rule_id = %record.id))]
    async fn save_rule(&self, record: RuleRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO logic_rules (id, name, description, entity_type, entity_id, conditions,
                                     actions, logic_type, is_active, priority, created_by,
                                     created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                entity_type = EXCLUDED.entity_type,
                entity_id = EXCLUDED.entity_id,
                conditions = EXCLUDED.conditions,
                actions = EXCLUDED.actions,
                logic_type = EXCLUDED.logic_type,
                is_active = EXCLUDED.is_active,
                priority = EXCLUDED.priority,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(&record.description)
        .bind(&record.entity_type)
        .bind(&record.entity_id)
        .bind(&record.conditions)
        .bind(&record.actions)
        .bind(&record.logic_type)
        .bind(record.is_active)
        .bind(record.priority)
        .bind(&record.created_by)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_rule(&self, id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM logic_rules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// 事件存储
pub struct PgIncidentStore {
    pool: PgPool,
}

impl PgIncidentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IncidentStore for PgIncidentStore {
    #[instrument(skip(self, incident), fields(title = %incident.title))]
    async fn create_incident(&self, incident: NewIncident) -> StoreResult<Incident> {
        let created = sqlx::query_as::<_, Incident>(
            r#"
            INSERT INTO incidents (id, title, description, severity, status, source_type, tags,
                                   created_by, mission_id, assigned_to)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, title, description, severity, status, source_type, tags,
                      created_by, mission_id, assigned_to, created_at
            "#,
        )
        .bind(Uuid::now_v7().to_string())
        .bind(&incident.title)
        .bind(&incident.description)
        .bind(&incident.severity)
        .bind(&incident.status)
        .bind(&incident.source_type)
        .bind(&incident.tags)
        .bind(&incident.created_by)
        .bind(&incident.mission_id)
        .bind(&incident.assigned_to)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }
}

/// 活动日志表行
#[derive(Debug, sqlx::FromRow)]
struct ActivityRow {
    id: String,
    created_at: DateTime<Utc>,
}

/// 活动日志
pub struct PgActivityLog {
    pool: PgPool,
}

impl PgActivityLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityLog for PgActivityLog {
    #[instrument(skip(self, activity), fields(action = %activity.action))]
    async fn record(&self, activity: NewActivity) -> StoreResult<Activity> {
        let row = sqlx::query_as::<_, ActivityRow>(
            r#"
            INSERT INTO activity_log (id, entity_type, entity_id, action, actor, actor_name,
                                      description, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, created_at
            "#,
        )
        .bind(Uuid::now_v7().to_string())
        .bind(&activity.entity_type)
        .bind(&activity.entity_id)
        .bind(&activity.action)
        .bind(&activity.actor)
        .bind(&activity.actor_name)
        .bind(&activity.description)
        .bind(&activity.metadata)
        .fetch_one(&self.pool)
        .await?;

        Ok(Activity::from_new(row.id, activity, row.created_at))
    }
}
