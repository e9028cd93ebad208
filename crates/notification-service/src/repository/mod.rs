//! 数据库仓储层
//!
//! 提供通知、模板、偏好的数据访问接口，封装 SQL 操作细节。
//!
//! ## 设计原则
//!
//! - 仓储只负责数据持久化，不包含业务逻辑
//! - 唯一约束由数据库保证，冲突映射为 Conflict
//! - 定义 trait 接口以支持 mock 测试和内存实现

pub mod memory;
mod notification_repo;
mod preference_repo;
mod template_repo;
mod traits;

pub use memory::{
    InMemoryNotificationRepository, InMemoryPreferenceRepository, InMemoryTemplateRepository,
};
pub use notification_repo::NotificationRepository;
pub use preference_repo::PreferenceRepository;
pub use template_repo::TemplateRepository;
pub use traits::*;
