//! 观看历史服务
//!
//! 历史只追加；按 (user, movie) 移除时删除全部匹配记录

use std::sync::Arc;
use std::time::Duration;

use movie_shared::cache::{CacheKey, CollectionCache};
use movie_shared::deadline::with_deadline;
use tracing::{info, instrument};
use validator::Validate;

use crate::error::Result;
use crate::models::{AddHistoryRequest, HistoryItem};
use crate::repository::HistoryRepositoryTrait;

use super::{DEFAULT_STORE_TIMEOUT, validate_user_id};

/// 历史列表返回的最大条数
pub const HISTORY_LIST_LIMIT: i64 = 50;

pub struct HistoryService<HR>
where
    HR: HistoryRepositoryTrait,
{
    repo: Arc<HR>,
    cache: CollectionCache,
    store_timeout: Duration,
}

impl<HR> HistoryService<HR>
where
    HR: HistoryRepositoryTrait,
{
    pub fn new(repo: Arc<HR>, cache: CollectionCache) -> Self {
        Self {
            repo,
            cache,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    /// 最近 50 条历史
    #[instrument(skip(self))]
    pub async fn get_history(&self, user_id: i64) -> Result<Vec<HistoryItem>> {
        validate_user_id(user_id)?;

        let key = CacheKey::history(user_id);
        self.cache
            .read_through(&key, || {
                with_deadline(
                    self.store_timeout,
                    "history.list_by_user",
                    self.repo.list_by_user(user_id, HISTORY_LIST_LIMIT),
                )
            })
            .await
    }

    #[instrument(skip(self, request), fields(movie_id = request.movie_id))]
    pub async fn add_to_history(&self, user_id: i64, request: AddHistoryRequest) -> Result<HistoryItem> {
        validate_user_id(user_id)?;
        request.validate()?;

        let item = with_deadline(
            self.store_timeout,
            "history.add",
            self.repo.add(user_id, request.movie_id, &request.action),
        )
        .await?;

        self.cache.invalidate(&CacheKey::history(user_id)).await;
        Ok(item)
    }

    /// 删除 (user, movie) 的全部历史，返回删除条数；没有匹配记录时返回 0
    #[instrument(skip(self))]
    pub async fn remove_from_history(&self, user_id: i64, movie_id: i64) -> Result<u64> {
        validate_user_id(user_id)?;

        let removed = with_deadline(
            self.store_timeout,
            "history.remove",
            self.repo.remove(user_id, movie_id),
        )
        .await?;

        self.cache.invalidate(&CacheKey::history(user_id)).await;
        info!(user_id, movie_id, removed, "History entries removed");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::repository::{InMemoryHistoryRepository, MockHistoryRepositoryTrait};
    use movie_shared::cache::MemoryCache;
    use movie_shared::config::CacheConfig;

    fn service() -> HistoryService<InMemoryHistoryRepository> {
        HistoryService::new(
            Arc::new(InMemoryHistoryRepository::new()),
            CollectionCache::new(Arc::new(MemoryCache::new()), &CacheConfig::default()),
        )
    }

    fn entry(movie_id: i64, action: &str) -> AddHistoryRequest {
        AddHistoryRequest {
            movie_id,
            action: action.to_string(),
        }
    }

    #[tokio::test]
    async fn test_same_pair_may_repeat() {
        let service = service();
        service.add_to_history(1, entry(5, "watched")).await.unwrap();
        service.add_to_history(1, entry(5, "rated")).await.unwrap();

        let history = service.get_history(1).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, "rated");
    }

    #[tokio::test]
    async fn test_remove_deletes_all_matching_rows() {
        let service = service();
        service.add_to_history(1, entry(5, "watched")).await.unwrap();
        service.add_to_history(1, entry(5, "rated")).await.unwrap();
        service.add_to_history(1, entry(6, "watched")).await.unwrap();

        assert_eq!(service.remove_from_history(1, 5).await.unwrap(), 2);
        assert_eq!(service.remove_from_history(1, 5).await.unwrap(), 0);

        let history = service.get_history(1).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].movie_id, 6);
    }

    #[tokio::test]
    async fn test_listing_is_bounded() {
        let service = service();
        for movie_id in 1..=60 {
            service.add_to_history(2, entry(movie_id, "watched")).await.unwrap();
        }

        let history = service.get_history(2).await.unwrap();
        assert_eq!(history.len(), HISTORY_LIST_LIMIT as usize);
        assert_eq!(history[0].movie_id, 60);
    }

    #[tokio::test]
    async fn test_oversized_action_rejected_before_store() {
        let mut repo = MockHistoryRepositoryTrait::new();
        repo.expect_add().never();
        let service = HistoryService::new(
            Arc::new(repo),
            CollectionCache::new(Arc::new(MemoryCache::new()), &CacheConfig::default()),
        );

        let err = tokio_test::assert_err!(service.add_to_history(1, entry(5, &"a".repeat(51))).await);
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(!err.is_retryable());

        let err = tokio_test::assert_err!(service.add_to_history(1, entry(0, "watched")).await);
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_column_width_action_is_stored() {
        let service = service();
        let item = tokio_test::assert_ok!(service.add_to_history(1, entry(5, &"a".repeat(50))).await);
        assert_eq!(item.action.len(), 50);
    }
}
