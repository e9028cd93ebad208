//! 片单仓储

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::WatchlistRepositoryTrait;
use crate::error::{Result, ServiceError};
use crate::models::WatchlistItem;

/// 片单仓储
///
/// 唯一性由数据库 UNIQUE (user_id, movie_id) 约束保证，并发加入同一部电影时
/// 只有一个成功，其余返回 Conflict
pub struct WatchlistRepository {
    pool: PgPool,
}

impl WatchlistRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WatchlistRepositoryTrait for WatchlistRepository {
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<WatchlistItem>> {
        let items = sqlx::query_as::<_, WatchlistItem>(
            r#"
            SELECT id, user_id, movie_id, created_at
            FROM watchlists
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    async fn add(&self, user_id: i64, movie_id: i64) -> Result<WatchlistItem> {
        sqlx::query_as::<_, WatchlistItem>(
            r#"
            INSERT INTO watchlists (user_id, movie_id)
            VALUES ($1, $2)
            RETURNING id, user_id, movie_id, created_at
            "#,
        )
        .bind(user_id)
        .bind(movie_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            ServiceError::from_insert(
                e,
                "WatchlistItem",
                format!("user_id={}, movie_id={}", user_id, movie_id),
            )
        })
    }

    async fn remove(&self, user_id: i64, movie_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM watchlists WHERE user_id = $1 AND movie_id = $2")
            .bind(user_id)
            .bind(movie_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn exists(&self, user_id: i64, movie_id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM watchlists WHERE user_id = $1 AND movie_id = $2)",
        )
        .bind(user_id)
        .bind(movie_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use movie_shared::config::DatabaseConfig;
    use movie_shared::database::Database;

    #[tokio::test]
    #[ignore] // 需要数据库连接
    async fn test_duplicate_add_maps_unique_violation_to_conflict() {
        let config = DatabaseConfig {
            url: std::env::var("DATABASE_URL").unwrap_or_else(|_| DatabaseConfig::default().url),
            ..Default::default()
        };
        let db = Database::connect(&config).await.unwrap();
        db.run_migrations().await.unwrap();

        let repo = WatchlistRepository::new(db.pool().clone());
        let user_id = chrono::Utc::now().timestamp_micros();

        repo.add(user_id, 1).await.unwrap();
        let err = repo.add(user_id, 1).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict { .. }));
        assert_eq!(repo.list_by_user(user_id).await.unwrap().len(), 1);

        assert_eq!(repo.remove(user_id, 1).await.unwrap(), 1);
        assert!(!repo.exists(user_id, 1).await.unwrap());
    }
}
