//! 片单服务错误类型
//!
//! 复用共享库的错误分类

pub use movie_shared::error::{Result, ServiceError};
