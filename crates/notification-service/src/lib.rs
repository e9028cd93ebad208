//! 通知服务
//!
//! 管理用户通知、消息模板与渠道偏好，并负责通知派发。
//!
//! ## 核心功能
//!
//! - **通知记录**：创建、查询（带旁路缓存）、已读标记、删除
//! - **模板直发**：按模板渲染邮件并直接发送（推荐、片单提醒、新片上映、评分提醒）
//! - **派发引擎**：批量处理 pending 通知，按用户偏好选择是否发送
//! - **模板管理**：模板 CRUD，(name, type) 唯一
//! - **偏好管理**：未设置时默认全部启用
//!
//! ## 模块结构
//!
//! - `models`: 领域模型定义
//! - `error`: 错误类型定义
//! - `repository`: 数据库仓储层（Postgres 与内存实现）
//! - `channels`: 邮件 / 推送渠道
//! - `template`: 模板引擎
//! - `service`: 业务服务层
//! - `worker`: 后台派发任务
//! - `testing`: 测试替身

pub mod channels;
pub mod error;
pub mod models;
pub mod repository;
pub mod service;
pub mod template;
pub mod testing;
pub mod worker;

pub use channels::{ChannelRegistry, ChannelSender};
pub use error::{Result, ServiceError};
pub use models::*;
pub use service::{
    DispatchEngine, DispatchReport, NotificationService, PreferenceService, TemplateService,
    TemplatedSend,
};
pub use template::{TemplateData, TemplateEngine};
pub use worker::DispatchWorker;
