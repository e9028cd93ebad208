//! 缓存层
//!
//! 为用户维度的集合读取（通知、片单、观看历史）提供旁路缓存（cache-aside）：
//!
//! - 读：先查缓存，命中直接返回；未命中从存储加载后按固定 TTL 回填
//! - 写：任何影响集合的写操作在返回前删除对应键，不做写穿更新
//!
//! 缓存只是加速器，不是数据源。所有缓存错误（连接失败、超时、反序列化失败）
//! 都在本模块内吸收并记录告警，读路径降级为未命中，写路径照常完成。

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use serde::{Serialize, de::DeserializeOwned};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::{CacheConfig, RedisConfig};
use crate::error::{Result, ServiceError};
use crate::observability::metrics;

// ==================== 键空间 ====================

/// 用户集合类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Notifications,
    Watchlist,
    History,
}

impl CollectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Notifications => "notifications",
            Self::Watchlist => "watchlist",
            Self::History => "history",
        }
    }
}

/// 缓存键
///
/// 只能通过 (集合类型, 用户 ID) 构造，格式为 `movie:{kind}:{user_id}`。
/// user_id 为整数，不可能包含分隔符，因此不同用户、不同集合之间不会冲突。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: CollectionKind,
    raw: String,
}

impl CacheKey {
    const NAMESPACE: &'static str = "movie";

    pub fn collection(kind: CollectionKind, user_id: i64) -> Self {
        Self {
            kind,
            raw: format!("{}:{}:{}", Self::NAMESPACE, kind.as_str(), user_id),
        }
    }

    pub fn notifications(user_id: i64) -> Self {
        Self::collection(CollectionKind::Notifications, user_id)
    }

    pub fn watchlist(user_id: i64) -> Self {
        Self::collection(CollectionKind::Watchlist, user_id)
    }

    pub fn history(user_id: i64) -> Self {
        Self::collection(CollectionKind::History, user_id)
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// ==================== 缓存后端 ====================

/// 带过期时间的键值存储
///
/// 后端实现只负责字节级存取，错误照常返回，由 [`CollectionCache`] 统一吸收。
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// 读取键，不存在或已过期返回 None
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// 写入键并设置绝对过期时间，覆盖已有值时重置 TTL
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    /// 删除键，键不存在不是错误
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Redis 缓存客户端
#[derive(Clone)]
pub struct RedisCache {
    client: Client,
}

impl RedisCache {
    /// 创建 Redis 客户端
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| ServiceError::CacheUnavailable(e.to_string()))?;
        info!("Redis client created");
        Ok(Self { client })
    }

    /// 获取连接
    async fn get_conn(&self) -> Result<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(redis_error)
    }

    /// 健康检查
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.get_conn().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(redis_error)
    }
}

fn redis_error(err: redis::RedisError) -> ServiceError {
    ServiceError::CacheUnavailable(err.to_string())
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.get_conn().await?;
        let value: Option<Vec<u8>> = conn.get(key).await.map_err(redis_error)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let mut conn = self.get_conn().await?;
        // SET EX 不接受 0 秒
        let seconds = ttl.as_secs().max(1);
        let _: () = conn.set_ex(key, value, seconds).await.map_err(redis_error)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.get_conn().await?;
        let _: () = conn.del(key).await.map_err(redis_error)?;
        Ok(())
    }
}

/// 进程内缓存
///
/// 用于本地开发与测试。过期时间基于 tokio 时钟，测试中可通过
/// `tokio::time::pause` / `advance` 推进。支持注入不可用状态以模拟故障。
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, (Vec<u8>, Instant)>,
    unavailable: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 切换为不可用状态，之后的所有操作返回 CacheUnavailable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// 检查键当前是否存在且未过期
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.1 > Instant::now())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(ServiceError::CacheUnavailable(
                "memory cache marked unavailable".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check_available()?;

        let now = Instant::now();
        let hit = match self.entries.get(key) {
            Some(entry) if entry.1 > now => Some(entry.0.clone()),
            Some(_) => None,
            None => return Ok(None),
        };

        if hit.is_none() {
            // 惰性清理已过期条目
            self.entries.remove_if(key, |_, (_, expires_at)| *expires_at <= now);
        }
        Ok(hit)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        self.check_available()?;
        self.entries
            .insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check_available()?;
        self.entries.remove(key);
        Ok(())
    }
}

// ==================== 集合缓存 ====================

/// 用户集合缓存
///
/// 在 [`CacheBackend`] 之上实现旁路缓存策略。所有方法都不会返回缓存错误：
/// 读失败视为未命中，写失败/删除失败只记录告警。
#[derive(Clone)]
pub struct CollectionCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
    op_timeout: Duration,
}

impl CollectionCache {
    pub fn new(backend: Arc<dyn CacheBackend>, config: &CacheConfig) -> Self {
        Self {
            backend,
            ttl: config.ttl(),
            op_timeout: config.op_timeout(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 探测缓存
    ///
    /// 命中返回反序列化后的快照；未命中、后端错误、超时、数据损坏一律返回 None
    #[instrument(skip(self), fields(key = %key))]
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let kind = key.kind().as_str();

        let bytes = match tokio::time::timeout(self.op_timeout, self.backend.get(key.as_str())).await
        {
            Ok(Ok(Some(bytes))) => bytes,
            Ok(Ok(None)) => {
                metrics::record_cache_request(kind, "miss");
                return None;
            }
            Ok(Err(e)) => {
                warn!(key = %key, error = %e, "Cache get failed, falling back to store");
                metrics::record_cache_request(kind, "error");
                return None;
            }
            Err(_) => {
                warn!(key = %key, timeout = ?self.op_timeout, "Cache get timed out, treating as miss");
                metrics::record_cache_request(kind, "error");
                return None;
            }
        };

        match serde_json::from_slice::<T>(&bytes) {
            Ok(value) => {
                metrics::record_cache_request(kind, "hit");
                Some(value)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cached snapshot is unreadable, treating as miss");
                metrics::record_cache_request(kind, "error");
                None
            }
        }
    }

    /// 回填缓存（尽力而为）
    #[instrument(skip(self, value), fields(key = %key))]
    pub async fn set<T: Serialize + ?Sized>(&self, key: &CacheKey, value: &T) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache serialization failed");
                return;
            }
        };

        match tokio::time::timeout(
            self.op_timeout,
            self.backend.set(key.as_str(), bytes, self.ttl),
        )
        .await
        {
            Ok(Ok(())) => debug!(key = %key, ttl = ?self.ttl, "Cache populated"),
            Ok(Err(e)) => warn!(key = %key, error = %e, "Cache set failed"),
            Err(_) => warn!(key = %key, timeout = ?self.op_timeout, "Cache set timed out"),
        }
    }

    /// 删除缓存键（尽力而为，幂等）
    #[instrument(skip(self), fields(key = %key))]
    pub async fn invalidate(&self, key: &CacheKey) {
        match tokio::time::timeout(self.op_timeout, self.backend.delete(key.as_str())).await {
            Ok(Ok(())) => debug!(key = %key, "Cache invalidated"),
            Ok(Err(e)) => warn!(key = %key, error = %e, "Failed to invalidate cache"),
            Err(_) => warn!(key = %key, timeout = ?self.op_timeout, "Cache invalidation timed out"),
        }
    }

    /// 读穿：命中直接返回，未命中调用 loader 并回填
    ///
    /// loader 的错误原样向上传播，缓存错误不会出现在返回值中
    pub async fn read_through<T, F, Fut>(&self, key: &CacheKey, loader: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(cached) = self.get::<T>(key).await {
            return Ok(cached);
        }

        let data = loader().await?;
        self.set(key, &data).await;

        Ok(data)
    }
}
