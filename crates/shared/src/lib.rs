//! 共享库
//!
//! 包含通知服务与片单服务共用的配置、错误处理、数据库连接、缓存和可观测性基础设施代码。

pub mod cache;
pub mod config;
pub mod database;
pub mod deadline;
pub mod error;
pub mod observability;
pub mod validation;

pub use error::{Result, ServiceError};
