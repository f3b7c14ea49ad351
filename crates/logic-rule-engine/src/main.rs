//! 逻辑规则引擎服务
//!
//! 提供 HTTP 接口的规则运行与试运行服务。配置了数据库地址时使用 PostgreSQL 存储，
//! 否则使用内存存储启动。

use anyhow::Result;
use logic_shared::config::AppConfig;
use logic_shared::database::Database;
use logic_shared::observability;
use rule_engine::actions::{ActionDispatcher, HttpWebhookClient};
use rule_engine::api::{self, AppState};
use rule_engine::engine::{EngineOptions, LogicEngine};
use rule_engine::service::LogicService;
use rule_engine::store::{
    ActivityLog, CachedRuleRepository, InMemoryActivityLog, InMemoryIncidentStore,
    InMemoryRuleRepository, IncidentStore, PgActivityLog, PgIncidentStore, PgRuleRepository,
    RuleRepository, run_migrations,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

const SERVICE_NAME: &str = "logic-engine";

/// 引擎依赖的外部存储
struct Stores {
    rules: Arc<dyn RuleRepository>,
    incidents: Arc<dyn IncidentStore>,
    activity_log: Arc<dyn ActivityLog>,
    database: Option<Database>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load(SERVICE_NAME).unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig {
            service_name: SERVICE_NAME.to_string(),
            ..Default::default()
        }
    });

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!(environment = %config.environment, "Starting logic-engine service...");

    let stores = build_stores(&config).await?;

    let mut dispatcher = ActionDispatcher::new(stores.incidents, stores.activity_log);
    match HttpWebhookClient::new(Duration::from_secs(config.engine.webhook_timeout_seconds)) {
        Ok(client) => dispatcher = dispatcher.with_webhook_client(Arc::new(client)),
        Err(e) => warn!(error = %e, "Webhook client unavailable, webhook actions will not be sent"),
    }

    let engine = LogicEngine::new(stores.rules, dispatcher).with_options(EngineOptions {
        serialize_per_entity: config.engine.serialize_per_entity,
    });
    let service = Arc::new(LogicService::new(Arc::new(engine)));
    let app = api::router(AppState::new(service));

    let addr = config.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(db) = stores.database {
        db.close().await;
    }

    info!("Service shutdown complete");
    Ok(())
}

/// 根据配置创建存储：有数据库地址时连接 PostgreSQL，否则使用内存存储
async fn build_stores(config: &AppConfig) -> Result<Stores> {
    if config.database.url.is_none() {
        warn!("No database url configured, using in-memory stores");
        return Ok(Stores {
            rules: Arc::new(InMemoryRuleRepository::new()),
            incidents: Arc::new(InMemoryIncidentStore::new()),
            activity_log: Arc::new(InMemoryActivityLog::new()),
            database: None,
        });
    }

    let db = Database::connect(&config.database).await?;
    run_migrations(db.pool()).await?;
    let pool = db.pool().clone();

    let rules = PgRuleRepository::new(pool.clone());
    let rules: Arc<dyn RuleRepository> = match config.engine.rule_cache_ttl_seconds {
        Some(ttl) => {
            info!(ttl_seconds = ttl, "Rule cache enabled");
            Arc::new(CachedRuleRepository::with_ttl_seconds(rules, ttl))
        }
        None => Arc::new(rules),
    };

    info!("Using PostgreSQL stores");
    Ok(Stores {
        rules,
        incidents: Arc::new(PgIncidentStore::new(pool.clone())),
        activity_log: Arc::new(PgActivityLog::new(pool)),
        database: Some(db),
    })
}

/// 优雅关闭信号处理
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
