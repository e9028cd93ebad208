//! 仓储 Trait 定义
//!
//! 定义仓储接口，便于服务层依赖抽象而非具体实现，支持 mock 测试

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    CreateTemplateRequest, NewNotification, Notification, NotificationStatus, Preference, Template,
};

/// 通知仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationRepositoryTrait: Send + Sync {
    async fn create(&self, notification: &NewNotification) -> Result<Notification>;
    async fn get(&self, id: i64) -> Result<Option<Notification>>;
    /// 按创建时间倒序
    async fn list_by_user(&self, user_id: i64, limit: i64) -> Result<Vec<Notification>>;
    /// 按创建时间正序（先进先出）
    async fn list_pending(&self, limit: i64) -> Result<Vec<Notification>>;

    /// 从 pending 迁移到终态，迁移到 sent 时记录 sent_at
    ///
    /// 记录不存在或已不是 pending 时返回 false
    async fn update_status(&self, id: i64, status: NotificationStatus) -> Result<bool>;

    /// 标记已读，重复标记保留首次时间
    async fn mark_read(&self, id: i64) -> Result<Option<Notification>>;

    /// 删除通知，返回所属用户
    async fn delete(&self, id: i64) -> Result<Option<i64>>;
}

/// 模板仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TemplateRepositoryTrait: Send + Sync {
    async fn list(&self) -> Result<Vec<Template>>;
    async fn get(&self, id: i64) -> Result<Option<Template>>;
    async fn find_by_name(&self, name: &str, template_type: &str) -> Result<Option<Template>>;
    /// (name, type) 重复时返回 Conflict
    async fn create(&self, request: &CreateTemplateRequest) -> Result<Template>;
    /// 记录不存在返回 None，(name, type) 与其他模板重复时返回 Conflict
    async fn update(&self, template: &Template) -> Result<Option<Template>>;
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// 偏好仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PreferenceRepositoryTrait: Send + Sync {
    async fn find_by_user(&self, user_id: i64) -> Result<Option<Preference>>;
    async fn upsert(&self, user_id: i64, email_enabled: bool, push_enabled: bool)
    -> Result<Preference>;
}
