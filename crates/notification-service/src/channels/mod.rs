//! 通知渠道实现
//!
//! 定义渠道发送 trait 并提供邮件、推送两种实现。
//!
//! ## 支持的渠道
//!
//! - **Email**: 邮件通知
//! - **Push**: App 推送通知
//!
//! 渠道被视为可能缓慢、可能失败的外部调用，发送失败以
//! `ServiceError::SenderFailure` 返回，由调用方决定如何处理。

mod email;
mod push;

pub use email::EmailChannel;
pub use push::PushChannel;

use std::sync::Arc;

use async_trait::async_trait;
use movie_shared::config::ChannelsConfig;

use crate::error::Result;
use crate::models::Channel;

/// 渠道发送 trait
#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// 渠道类型标识
    fn channel(&self) -> Channel;

    /// 渠道是否启用（全局开关，与用户偏好无关）
    fn is_enabled(&self) -> bool {
        true
    }

    /// 由用户 ID 推导收件地址
    fn recipient_for(&self, user_id: i64) -> String;

    /// 发送一条消息
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// 渠道注册表
///
/// 按渠道类型路由到具体的发送实现
#[derive(Clone)]
pub struct ChannelRegistry {
    email: Arc<dyn ChannelSender>,
    push: Arc<dyn ChannelSender>,
}

impl ChannelRegistry {
    pub fn new(email: Arc<dyn ChannelSender>, push: Arc<dyn ChannelSender>) -> Self {
        Self { email, push }
    }

    /// 使用配置创建默认渠道
    pub fn from_config(config: &ChannelsConfig) -> Self {
        Self::new(
            Arc::new(EmailChannel::from_config(config)),
            Arc::new(PushChannel::from_config(config)),
        )
    }

    pub fn sender(&self, channel: Channel) -> &Arc<dyn ChannelSender> {
        match channel {
            Channel::Email => &self.email,
            Channel::Push => &self.push,
        }
    }

    /// 向用户发送消息，收件地址由渠道推导
    pub async fn deliver(&self, channel: Channel, user_id: i64, subject: &str, body: &str) -> Result<()> {
        let sender = self.sender(channel);
        let to = sender.recipient_for(user_id);
        sender.send(&to, subject, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_routes_by_channel() {
        let registry = ChannelRegistry::from_config(&ChannelsConfig::default());
        assert_eq!(registry.sender(Channel::Email).channel(), Channel::Email);
        assert_eq!(registry.sender(Channel::Push).channel(), Channel::Push);
    }

    #[tokio::test]
    async fn test_deliver_through_default_channels() {
        let registry = ChannelRegistry::from_config(&ChannelsConfig::default());
        tokio_test::assert_ok!(registry.deliver(Channel::Email, 3, "s", "b").await);
        tokio_test::assert_ok!(registry.deliver(Channel::Push, 3, "t", "b").await);
    }
}
