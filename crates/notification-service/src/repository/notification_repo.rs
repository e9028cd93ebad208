//! 通知仓储
//!
//! 提供通知记录的数据访问

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::NotificationRepositoryTrait;
use crate::error::Result;
use crate::models::{NewNotification, Notification, NotificationStatus};

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, type, title, content, status, channel, created_at, sent_at, read_at";

/// 通知仓储
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepositoryTrait for NotificationRepository {
    async fn create(&self, notification: &NewNotification) -> Result<Notification> {
        let sql = format!(
            r#"
            INSERT INTO notifications (user_id, type, title, content, status, channel, sent_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        );

        let created = sqlx::query_as::<_, Notification>(&sql)
            .bind(notification.user_id)
            .bind(&notification.notification_type)
            .bind(&notification.title)
            .bind(&notification.content)
            .bind(notification.status)
            .bind(notification.channel)
            .bind(notification.sent_at)
            .fetch_one(&self.pool)
            .await?;

        Ok(created)
    }

    async fn get(&self, id: i64) -> Result<Option<Notification>> {
        let sql = format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1");

        let notification = sqlx::query_as::<_, Notification>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(notification)
    }

    async fn list_by_user(&self, user_id: i64, limit: i64) -> Result<Vec<Notification>> {
        let sql = format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#
        );

        let notifications = sqlx::query_as::<_, Notification>(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(notifications)
    }

    async fn list_pending(&self, limit: i64) -> Result<Vec<Notification>> {
        let sql = format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE status = 'pending'
            ORDER BY created_at ASC, id ASC
            LIMIT $1
            "#
        );

        let notifications = sqlx::query_as::<_, Notification>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(notifications)
    }

    async fn update_status(&self, id: i64, status: NotificationStatus) -> Result<bool> {
        // 只允许从 pending 迁出，sent / failed 为终态
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET status = $2,
                sent_at = CASE WHEN $2 = 'sent' THEN NOW() ELSE sent_at END
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(status)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_read(&self, id: i64) -> Result<Option<Notification>> {
        let sql = format!(
            r#"
            UPDATE notifications
            SET read_at = COALESCE(read_at, NOW())
            WHERE id = $1
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        );

        let notification = sqlx::query_as::<_, Notification>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(notification)
    }

    async fn delete(&self, id: i64) -> Result<Option<i64>> {
        let user_id: Option<i64> =
            sqlx::query_scalar("DELETE FROM notifications WHERE id = $1 RETURNING user_id")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(user_id)
    }
}
