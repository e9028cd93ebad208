//! Email 邮件通知渠道
//!
//! 当前为模拟实现，只记录日志。生产环境需要接入真实的邮件服务。

use async_trait::async_trait;
use movie_shared::config::ChannelsConfig;
use tracing::{debug, info};

use super::ChannelSender;
use crate::error::{Result, ServiceError};
use crate::models::Channel;

/// Email 邮件通知渠道
pub struct EmailChannel {
    enabled: bool,
    /// 发件人地址
    from_address: String,
    /// 占位收件域名，收件地址为 user{id}@{domain}
    recipient_domain: String,
}

impl EmailChannel {
    pub fn new(enabled: bool, from_address: impl Into<String>, recipient_domain: impl Into<String>) -> Self {
        Self {
            enabled,
            from_address: from_address.into(),
            recipient_domain: recipient_domain.into(),
        }
    }

    pub fn from_config(config: &ChannelsConfig) -> Self {
        Self::new(
            config.email_enabled,
            config.email_from.clone(),
            config.email_recipient_domain.clone(),
        )
    }
}

#[async_trait]
impl ChannelSender for EmailChannel {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn recipient_for(&self, user_id: i64) -> String {
        format!("user{}@{}", user_id, self.recipient_domain)
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        if !self.enabled {
            return Err(ServiceError::SenderFailure {
                channel: Channel::Email.to_string(),
                reason: "email 渠道已禁用".to_string(),
            });
        }
        if to.is_empty() {
            return Err(ServiceError::SenderFailure {
                channel: Channel::Email.to_string(),
                reason: "收件地址为空".to_string(),
            });
        }

        debug!(from = %self.from_address, to, body_length = body.len(), "Email 发送中...");
        info!(to, subject, "Email 发送成功");
        Ok(())
    }
}
