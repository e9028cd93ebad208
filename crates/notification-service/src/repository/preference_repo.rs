//! 偏好仓储

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::PreferenceRepositoryTrait;
use crate::error::Result;
use crate::models::Preference;

/// 偏好仓储
///
/// 查询不存在的用户返回 None，默认值由服务层合成
pub struct PreferenceRepository {
    pool: PgPool,
}

impl PreferenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PreferenceRepositoryTrait for PreferenceRepository {
    async fn find_by_user(&self, user_id: i64) -> Result<Option<Preference>> {
        let preference = sqlx::query_as::<_, Preference>(
            r#"
            SELECT id, user_id, email_enabled, push_enabled, created_at, updated_at
            FROM preferences
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(preference)
    }

    async fn upsert(
        &self,
        user_id: i64,
        email_enabled: bool,
        push_enabled: bool,
    ) -> Result<Preference> {
        let preference = sqlx::query_as::<_, Preference>(
            r#"
            INSERT INTO preferences (user_id, email_enabled, push_enabled)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
            SET email_enabled = EXCLUDED.email_enabled,
                push_enabled = EXCLUDED.push_enabled,
                updated_at = NOW()
            RETURNING id, user_id, email_enabled, push_enabled, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(email_enabled)
        .bind(push_enabled)
        .fetch_one(&self.pool)
        .await?;

        Ok(preference)
    }
}
