//! 通知模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use movie_shared::validation::not_blank;
use validator::Validate;

use super::enums::{Channel, NotificationStatus};

/// 通知记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    /// 自由标签，如 new_release
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub notification_type: String,
    pub title: String,
    pub content: String,
    pub status: NotificationStatus,
    pub channel: Channel,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

/// 待写入的通知
///
/// 普通创建固定为 pending；模板直发成功后以 sent 状态写入历史
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: i64,
    pub notification_type: String,
    pub title: String,
    pub content: String,
    pub status: NotificationStatus,
    pub channel: Channel,
    pub sent_at: Option<DateTime<Utc>>,
}

impl NewNotification {
    pub fn pending(
        user_id: i64,
        notification_type: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        channel: Channel,
    ) -> Self {
        Self {
            user_id,
            notification_type: notification_type.into(),
            title: title.into(),
            content: content.into(),
            status: NotificationStatus::Pending,
            channel,
            sent_at: None,
        }
    }

    /// 已经发送成功的通知，sent_at 取当前时间
    pub fn delivered(
        user_id: i64,
        notification_type: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        channel: Channel,
    ) -> Self {
        Self {
            status: NotificationStatus::Sent,
            sent_at: Some(Utc::now()),
            ..Self::pending(user_id, notification_type, title, content, channel)
        }
    }
}

/// 创建通知请求
///
/// 长度上限与 notifications 表的列宽一致
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateNotificationRequest {
    #[validate(range(min = 1, message = "user_id 必须为正数"))]
    pub user_id: i64,
    #[serde(rename = "type")]
    #[validate(
        length(min = 1, max = 50, message = "type 长度必须在1-50个字符之间"),
        custom(function = "not_blank", message = "type 不能为空")
    )]
    pub notification_type: String,
    #[validate(
        length(min = 1, max = 255, message = "title 长度必须在1-255个字符之间"),
        custom(function = "not_blank", message = "title 不能为空")
    )]
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// 缺省为 email
    #[serde(default)]
    pub channel: Option<Channel>,
}

impl CreateNotificationRequest {
    pub fn into_new(self) -> NewNotification {
        NewNotification::pending(
            self.user_id,
            self.notification_type,
            self.title,
            self.content,
            self.channel.unwrap_or_default(),
        )
    }
}
