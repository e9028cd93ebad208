//! 观看历史模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use movie_shared::validation::not_blank;
use validator::Validate;

/// 历史条目
///
/// 只追加，没有唯一约束，同一 (user, movie) 可以有多条不同 action 的记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct HistoryItem {
    pub id: i64,
    pub user_id: i64,
    pub movie_id: i64,
    /// 自由标签，如 watched / rated
    pub action: String,
    pub created_at: DateTime<Utc>,
}

/// 追加历史请求
///
/// action 上限与 history 表的列宽一致
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddHistoryRequest {
    #[validate(range(min = 1, message = "movie_id 必须为正数"))]
    pub movie_id: i64,
    #[validate(
        length(min = 1, max = 50, message = "action 长度必须在1-50个字符之间"),
        custom(function = "not_blank", message = "action 不能为空")
    )]
    pub action: String,
}
