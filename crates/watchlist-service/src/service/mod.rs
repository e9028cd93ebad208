//! 服务层
//!
//! - `watchlist_service`: 片单（加入、移除、查询、存在性）
//! - `history_service`: 观看历史（追加、移除、查询）

pub mod history_service;
pub mod watchlist_service;

use std::time::Duration;

use crate::error::{Result, ServiceError};

pub use history_service::HistoryService;
pub use watchlist_service::WatchlistService;

/// 存储调用的默认截止时间
pub(crate) const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) fn validate_user_id(user_id: i64) -> Result<()> {
    if user_id <= 0 {
        return Err(ServiceError::Validation("user_id 必须为正数".to_string()));
    }
    Ok(())
}
