//! 通知服务
//!
//! 启动派发 Worker，定期处理 pending 通知。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use movie_shared::{
    cache::{CollectionCache, RedisCache},
    config::AppConfig,
    database::Database,
    observability,
};
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use notification_service::{
    ChannelRegistry, DispatchEngine, DispatchWorker,
    repository::{NotificationRepository, PreferenceRepository},
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载配置
    let config = AppConfig::load("notification-service").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    // 2. 初始化可观测性
    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!("Starting notification-service...");
    info!(environment = %config.environment, "Configuration loaded");

    // 3. 初始化数据库并建表
    let db = Database::connect(&config.database).await?;
    db.run_migrations().await?;
    let pool = db.pool().clone();
    info!("Database connection established");

    // 4. 初始化 Redis 缓存，不可用时仍继续启动（缓存只是加速器）
    let redis = Arc::new(RedisCache::new(&config.redis)?);
    if let Err(e) = redis.health_check().await {
        warn!(error = %e, "Redis unavailable at startup, reads will fall back to the database");
    }
    let cache = CollectionCache::new(redis, &config.cache);

    // 5. 创建仓储与渠道
    let notification_repo = Arc::new(NotificationRepository::new(pool.clone()));
    let preference_repo = Arc::new(PreferenceRepository::new(pool.clone()));
    let channels = ChannelRegistry::from_config(&config.channels);

    // 6. 创建派发引擎
    let engine = Arc::new(
        DispatchEngine::new(notification_repo, preference_repo, channels, cache)
            .with_batch_size(config.dispatch.batch_size)
            .with_store_timeout(config.database.statement_timeout()),
    );

    // 7. 启动派发 Worker
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = if config.dispatch.enabled {
        let worker = DispatchWorker::new(
            engine,
            Duration::from_secs(config.dispatch.interval_seconds),
        );
        Some(tokio::spawn(async move { worker.run(shutdown_rx).await }))
    } else {
        warn!("Dispatch worker disabled by configuration");
        None
    };

    // 8. 等待退出信号
    shutdown_signal().await;
    info!("Shutdown signal received, stopping...");

    let _ = shutdown_tx.send(true);
    if let Some(handle) = worker_handle {
        if let Err(e) = handle.await {
            warn!(error = %e, "Dispatch worker did not stop cleanly");
        }
    }

    db.close().await;
    info!("notification-service stopped");
    Ok(())
}

/// 等待 Ctrl+C 或 SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
