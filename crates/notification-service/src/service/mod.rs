//! 服务层
//!
//! 实现通知业务逻辑，协调仓储层、缓存层和渠道。
//!
//! ## 模块结构
//!
//! - `notification_service`: 通知记录与模板直发
//! - `template_service`: 模板管理
//! - `preference_service`: 用户偏好
//! - `dispatcher`: pending 通知派发引擎

pub mod dispatcher;
pub mod notification_service;
pub mod preference_service;
pub mod template_service;

use std::time::Duration;

use crate::error::{Result, ServiceError};

pub use dispatcher::{DispatchEngine, DispatchReport};
pub use notification_service::{NotificationService, TemplatedSend, template_names};
pub use preference_service::PreferenceService;
pub use template_service::TemplateService;

/// 存储调用的默认截止时间
pub(crate) const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) fn validate_user_id(user_id: i64) -> Result<()> {
    if user_id <= 0 {
        return Err(ServiceError::Validation("user_id 必须为正数".to_string()));
    }
    Ok(())
}
