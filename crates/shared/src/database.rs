//! 数据库连接管理模块
//!
//! 提供 PostgreSQL 连接池管理、健康检查以及表结构初始化。

use crate::config::DatabaseConfig;
use crate::error::{Result, ServiceError};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

/// 建表语句
///
/// 全部使用 IF NOT EXISTS，重复执行无副作用
const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS notifications (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL,
        type VARCHAR(50) NOT NULL,
        title VARCHAR(255) NOT NULL,
        content TEXT NOT NULL DEFAULT '',
        status VARCHAR(20) NOT NULL DEFAULT 'pending',
        channel VARCHAR(20) NOT NULL DEFAULT 'email',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        sent_at TIMESTAMPTZ,
        read_at TIMESTAMPTZ
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_notifications_user_id ON notifications(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_notifications_status_created ON notifications(status, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS templates (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(100) NOT NULL,
        type VARCHAR(50) NOT NULL,
        subject VARCHAR(255) NOT NULL DEFAULT '',
        content TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (name, type)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS preferences (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL UNIQUE,
        email_enabled BOOLEAN NOT NULL DEFAULT TRUE,
        push_enabled BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS watchlists (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL,
        movie_id BIGINT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (user_id, movie_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_watchlists_user_id ON watchlists(user_id)",
    r#"
    CREATE TABLE IF NOT EXISTS history (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL,
        movie_id BIGINT NOT NULL,
        action VARCHAR(50) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_history_user_id ON history(user_id)",
];

/// 默认邮件模板
///
/// (name, type, subject, content)
pub const DEFAULT_TEMPLATES: &[(&str, &str, &str, &str)] = &[
    (
        "movie_recommendation",
        "email",
        "New Movie Recommendation",
        "Hi {{username}}, we have a new movie recommendation for you: {{movie_title}}",
    ),
    (
        "watchlist_reminder",
        "email",
        "Movies in Your Watchlist",
        "Hi {{username}}, you have {{count}} movies in your watchlist. Why not watch one tonight?",
    ),
    (
        "new_release",
        "email",
        "New Movie Release",
        "Hi {{username}}, a new movie \"{{movie_title}}\" has been released that you might like.",
    ),
    (
        "rating_reminder",
        "email",
        "Rate Your Watched Movies",
        "Hi {{username}}, you recently watched \"{{movie_title}}\". Would you like to rate it?",
    ),
];

/// 数据库连接池包装
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 创建数据库连接池
    #[instrument(skip(config))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect(&config.url)
            .await?;

        info!("Database connection pool created");

        Ok(Self { pool })
    }

    /// 获取连接池引用
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 健康检查
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(ServiceError::from)
    }

    /// 关闭连接池
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database connection pool closed");
    }

    /// 初始化表结构并写入默认模板
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");

        for statement in SCHEMA_STATEMENTS {
            sqlx::query(*statement).execute(&self.pool).await?;
        }

        for (name, template_type, subject, content) in DEFAULT_TEMPLATES {
            sqlx::query(
                r#"
                INSERT INTO templates (name, type, subject, content)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (name, type) DO NOTHING
                "#,
            )
            .bind(*name)
            .bind(*template_type)
            .bind(*subject)
            .bind(*content)
            .execute(&self.pool)
            .await?;
        }

        info!(
            tables = 5,
            seeded_templates = DEFAULT_TEMPLATES.len(),
            "Database migrations complete"
        );
        Ok(())
    }
}

impl std::ops::Deref for Database {
    type Target = PgPool;

    fn deref(&self) -> &Self::Target {
        &self.pool
    }
}
