//! 片单服务
//!
//! 读取走旁路缓存，加入 / 移除在返回前删除该用户的片单缓存

use std::sync::Arc;
use std::time::Duration;

use movie_shared::cache::{CacheKey, CollectionCache};
use movie_shared::deadline::with_deadline;
use tracing::{info, instrument};
use validator::Validate;

use crate::error::Result;
use crate::models::{AddWatchlistRequest, WatchlistItem};
use crate::repository::WatchlistRepositoryTrait;

use super::{DEFAULT_STORE_TIMEOUT, validate_user_id};

/// 片单服务
pub struct WatchlistService<WR>
where
    WR: WatchlistRepositoryTrait,
{
    repo: Arc<WR>,
    cache: CollectionCache,
    store_timeout: Duration,
}

impl<WR> WatchlistService<WR>
where
    WR: WatchlistRepositoryTrait,
{
    pub fn new(repo: Arc<WR>, cache: CollectionCache) -> Self {
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

    /// 获取用户片单（全部，按加入时间倒序）
    #[instrument(skip(self))]
    pub async fn get_watchlist(&self, user_id: i64) -> Result<Vec<WatchlistItem>> {
        validate_user_id(user_id)?;

        let key = CacheKey::watchlist(user_id);
        self.cache
            .read_through(&key, || {
                with_deadline(
                    self.store_timeout,
                    "watchlist.list_by_user",
                    self.repo.list_by_user(user_id),
                )
            })
            .await
    }

    /// 加入片单，已存在时返回 Conflict
    #[instrument(skip(self))]
    pub async fn add_to_watchlist(
        &self,
        user_id: i64,
        request: AddWatchlistRequest,
    ) -> Result<WatchlistItem> {
        validate_user_id(user_id)?;
        request.validate()?;

        let item = with_deadline(
            self.store_timeout,
            "watchlist.add",
            self.repo.add(user_id, request.movie_id),
        )
        .await?;

        self.cache.invalidate(&CacheKey::watchlist(user_id)).await;
        info!(user_id, movie_id = request.movie_id, "Movie added to watchlist");
        Ok(item)
    }

    /// 移除片单条目，不存在时视为成功，返回是否实际删除
    #[instrument(skip(self))]
    pub async fn remove_from_watchlist(&self, user_id: i64, movie_id: i64) -> Result<bool> {
        validate_user_id(user_id)?;

        let removed = with_deadline(
            self.store_timeout,
            "watchlist.remove",
            self.repo.remove(user_id, movie_id),
        )
        .await?;

        self.cache.invalidate(&CacheKey::watchlist(user_id)).await;
        Ok(removed > 0)
    }

    pub async fn is_in_watchlist(&self, user_id: i64, movie_id: i64) -> Result<bool> {
        validate_user_id(user_id)?;
        with_deadline(
            self.store_timeout,
            "watchlist.exists",
            self.repo.exists(user_id, movie_id),
        )
        .await
    }
}
