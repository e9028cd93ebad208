//! App 推送通知渠道
//!
//! 模拟实现，设备令牌以用户 ID 代替

use async_trait::async_trait;
use movie_shared::config::ChannelsConfig;
use tracing::info;

use super::ChannelSender;
use crate::error::{Result, ServiceError};
use crate::models::Channel;

pub struct PushChannel {
    enabled: bool,
}

impl PushChannel {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn from_config(config: &ChannelsConfig) -> Self {
        Self::new(config.push_enabled)
    }
}

#[async_trait]
impl ChannelSender for PushChannel {
    fn channel(&self) -> Channel {
        Channel::Push
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn recipient_for(&self, user_id: i64) -> String {
        user_id.to_string()
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        if !self.enabled {
            return Err(ServiceError::SenderFailure {
                channel: Channel::Push.to_string(),
                reason: "push 渠道已禁用".to_string(),
            });
        }

        info!(device = to, title = subject, body_length = body.len(), "Push 发送成功");
        Ok(())
    }
}
