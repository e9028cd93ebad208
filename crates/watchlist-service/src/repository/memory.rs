//! 内存仓储实现
//!
//! 与 Postgres 实现保持一致的排序和唯一约束，可通过 `set_unavailable` 模拟故障

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::traits::{HistoryRepositoryTrait, WatchlistRepositoryTrait};
use crate::error::{Result, ServiceError};
use crate::models::{HistoryItem, WatchlistItem};

fn check(flag: &AtomicBool) -> Result<()> {
    if flag.load(Ordering::SeqCst) {
        Err(ServiceError::StoreUnavailable(sqlx::Error::PoolTimedOut))
    } else {
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryWatchlistRepository {
    rows: RwLock<Vec<WatchlistItem>>,
    next_id: AtomicI64,
    unavailable: AtomicBool,
}

impl InMemoryWatchlistRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// 某个 (user, movie) 的行数
    pub async fn count(&self, user_id: i64, movie_id: i64) -> usize {
        self.rows
            .read()
            .await
            .iter()
            .filter(|i| i.user_id == user_id && i.movie_id == movie_id)
            .count()
    }
}

#[async_trait]
impl WatchlistRepositoryTrait for InMemoryWatchlistRepository {
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<WatchlistItem>> {
        check(&self.unavailable)?;

        let mut items: Vec<_> = self
            .rows
            .read()
            .await
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(items)
    }

    async fn add(&self, user_id: i64, movie_id: i64) -> Result<WatchlistItem> {
        check(&self.unavailable)?;

        // 检查与插入在同一把写锁内完成
        let mut rows = self.rows.write().await;
        if rows
            .iter()
            .any(|i| i.user_id == user_id && i.movie_id == movie_id)
        {
            return Err(ServiceError::conflict(
                "WatchlistItem",
                format!("user_id={}, movie_id={}", user_id, movie_id),
            ));
        }

        let item = WatchlistItem {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            user_id,
            movie_id,
            created_at: Utc::now(),
        };
        rows.push(item.clone());
        Ok(item)
    }

    async fn remove(&self, user_id: i64, movie_id: i64) -> Result<u64> {
        check(&self.unavailable)?;

        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|i| !(i.user_id == user_id && i.movie_id == movie_id));
        Ok((before - rows.len()) as u64)
    }

    async fn exists(&self, user_id: i64, movie_id: i64) -> Result<bool> {
        check(&self.unavailable)?;
        Ok(self.count(user_id, movie_id).await > 0)
    }
}

#[derive(Default)]
pub struct InMemoryHistoryRepository {
    rows: RwLock<Vec<HistoryItem>>,
    next_id: AtomicI64,
    unavailable: AtomicBool,
}

impl InMemoryHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl HistoryRepositoryTrait for InMemoryHistoryRepository {
    async fn list_by_user(&self, user_id: i64, limit: i64) -> Result<Vec<HistoryItem>> {
        check(&self.unavailable)?;

        let mut items: Vec<_> = self
            .rows
            .read()
            .await
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        items.truncate(limit.max(0) as usize);
        Ok(items)
    }

    async fn add(&self, user_id: i64, movie_id: i64, action: &str) -> Result<HistoryItem> {
        check(&self.unavailable)?;

        let item = HistoryItem {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            user_id,
            movie_id,
            action: action.to_string(),
            created_at: Utc::now(),
        };
        self.rows.write().await.push(item.clone());
        Ok(item)
    }

    async fn remove(&self, user_id: i64, movie_id: i64) -> Result<u64> {
        check(&self.unavailable)?;

        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|i| !(i.user_id == user_id && i.movie_id == movie_id));
        Ok((before - rows.len()) as u64)
    }
}
