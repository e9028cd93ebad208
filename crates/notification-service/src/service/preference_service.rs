//! 偏好服务
//!
//! 生效偏好 = 可空查询 + 默认值合成。查询本身从不写入存储，
//! 只有显式更新才会创建记录。

use std::sync::Arc;
use std::time::Duration;

use movie_shared::deadline::with_deadline;
use tracing::{info, instrument};

use crate::error::Result;
use crate::models::{EffectivePreference, UpdatePreferenceRequest};
use crate::repository::PreferenceRepositoryTrait;

use super::{DEFAULT_STORE_TIMEOUT, validate_user_id};

/// 查询用户的生效偏好
pub(crate) async fn effective_preference<PR>(
    repo: &PR,
    user_id: i64,
    deadline: Duration,
) -> Result<EffectivePreference>
where
    PR: PreferenceRepositoryTrait + ?Sized,
{
    let stored = with_deadline(deadline, "preferences.find_by_user", repo.find_by_user(user_id)).await?;
    Ok(EffectivePreference::resolve(user_id, stored.as_ref()))
}

/// 偏好服务
pub struct PreferenceService<PR>
where
    PR: PreferenceRepositoryTrait,
{
    repo: Arc<PR>,
    store_timeout: Duration,
}

impl<PR> PreferenceService<PR>
where
    PR: PreferenceRepositoryTrait,
{
    pub fn new(repo: Arc<PR>) -> Self {
        Self {
            repo,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    /// 获取生效偏好，没有记录时返回全部启用且不落库
    #[instrument(skip(self))]
    pub async fn get_preferences(&self, user_id: i64) -> Result<EffectivePreference> {
        validate_user_id(user_id)?;
        effective_preference(self.repo.as_ref(), user_id, self.store_timeout).await
    }

    /// 部分更新偏好，未提供的字段沿用当前生效值
    #[instrument(skip(self))]
    pub async fn update_preferences(
        &self,
        user_id: i64,
        request: UpdatePreferenceRequest,
    ) -> Result<EffectivePreference> {
        validate_user_id(user_id)?;

        let current = effective_preference(self.repo.as_ref(), user_id, self.store_timeout).await?;
        let (email_enabled, push_enabled) = request.apply(current);

        let saved = with_deadline(
            self.store_timeout,
            "preferences.upsert",
            self.repo.upsert(user_id, email_enabled, push_enabled),
        )
        .await?;

        info!(user_id, email_enabled, push_enabled, "Preferences updated");
        Ok(EffectivePreference::resolve(user_id, Some(&saved)))
    }
}
