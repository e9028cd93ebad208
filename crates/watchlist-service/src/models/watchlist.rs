//! 片单模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// 片单条目，(user_id, movie_id) 唯一
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct WatchlistItem {
    pub id: i64,
    pub user_id: i64,
    pub movie_id: i64,
    pub created_at: DateTime<Utc>,
}

/// 加入片单请求
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct AddWatchlistRequest {
    #[validate(range(min = 1, message = "movie_id 必须为正数"))]
    pub movie_id: i64,
}
