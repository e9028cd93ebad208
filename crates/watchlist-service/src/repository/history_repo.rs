//! 观看历史仓储

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::HistoryRepositoryTrait;
use crate::error::Result;
use crate::models::HistoryItem;

pub struct HistoryRepository {
    pool: PgPool,
}

impl HistoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryRepositoryTrait for HistoryRepository {
    async fn list_by_user(&self, user_id: i64, limit: i64) -> Result<Vec<HistoryItem>> {
        let items = sqlx::query_as::<_, HistoryItem>(
            r#"
            SELECT id, user_id, movie_id, action, created_at
            FROM history
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    async fn add(&self, user_id: i64, movie_id: i64, action: &str) -> Result<HistoryItem> {
        let item = sqlx::query_as::<_, HistoryItem>(
            r#"
            INSERT INTO history (user_id, movie_id, action)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, movie_id, action, created_at
            "#,
        )
        .bind(user_id)
        .bind(movie_id)
        .bind(action)
        .fetch_one(&self.pool)
        .await?;

        Ok(item)
    }

    async fn remove(&self, user_id: i64, movie_id: i64) -> Result<u64> {
        // 删除该电影的全部历史记录，而不只是最近一条
        let result = sqlx::query("DELETE FROM history WHERE user_id = $1 AND movie_id = $2")
            .bind(user_id)
            .bind(movie_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
