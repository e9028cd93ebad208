//! 片单服务
//!
//! 维护用户的待看片单与观看历史，按用户集合做旁路缓存。
//!
//! ## 模块结构
//!
//! - `models`: 领域模型定义
//! - `error`: 错误类型定义
//! - `repository`: 数据库仓储层（Postgres 与内存实现）
//! - `service`: 业务服务层

pub mod error;
pub mod models;
pub mod repository;
pub mod service;

pub use error::{Result, ServiceError};
pub use models::*;
pub use service::{HistoryService, WatchlistService};
