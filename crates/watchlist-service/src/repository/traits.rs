//! 仓储 Trait 定义

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{HistoryItem, WatchlistItem};

/// 片单仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WatchlistRepositoryTrait: Send + Sync {
    /// 用户全部片单，按加入时间倒序
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<WatchlistItem>>;
    /// 已存在时返回 Conflict，不做去重或更新
    async fn add(&self, user_id: i64, movie_id: i64) -> Result<WatchlistItem>;
    /// 返回删除的行数
    async fn remove(&self, user_id: i64, movie_id: i64) -> Result<u64>;
    async fn exists(&self, user_id: i64, movie_id: i64) -> Result<bool>;
}

/// 观看历史仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryRepositoryTrait: Send + Sync {
    /// 最近的历史，按时间倒序
    async fn list_by_user(&self, user_id: i64, limit: i64) -> Result<Vec<HistoryItem>>;
    async fn add(&self, user_id: i64, movie_id: i64, action: &str) -> Result<HistoryItem>;
    /// 删除 (user, movie) 的全部记录，返回删除的行数
    async fn remove(&self, user_id: i64, movie_id: i64) -> Result<u64>;
}
