//! 测试替身
//!
//! 记录发送内容的渠道实现，支持注入发送失败和禁用状态，
//! 供单元测试与集成测试组装完整服务。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::channels::{ChannelRegistry, ChannelSender};
use crate::error::{Result, ServiceError};
use crate::models::Channel;

/// 一次发送记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// 记录型渠道
pub struct RecordingChannel {
    channel: Channel,
    sent: Mutex<Vec<SentMessage>>,
    fail: AtomicBool,
    /// 收件地址包含该子串时发送失败
    fail_recipient: Mutex<Option<String>>,
    enabled: AtomicBool,
}

impl RecordingChannel {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            sent: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            fail_recipient: Mutex::new(None),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// 只让发往指定收件人的消息失败
    pub fn fail_for_recipient(&self, to: impl Into<String>) {
        *self
            .fail_recipient
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(to.into());
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent().len()
    }

    fn should_fail(&self, to: &str) -> bool {
        if self.fail.load(Ordering::SeqCst) {
            return true;
        }
        self.fail_recipient
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_deref()
            .is_some_and(|target| target == to)
    }
}

#[async_trait]
impl ChannelSender for RecordingChannel {
    fn channel(&self) -> Channel {
        self.channel
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn recipient_for(&self, user_id: i64) -> String {
        match self.channel {
            Channel::Email => format!("user{}@example.com", user_id),
            Channel::Push => user_id.to_string(),
        }
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        if self.should_fail(to) {
            return Err(ServiceError::SenderFailure {
                channel: self.channel.to_string(),
                reason: "simulated provider failure".to_string(),
            });
        }

        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(SentMessage {
                to: to.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
        Ok(())
    }
}

/// 记录型渠道组
pub struct RecordingChannels {
    pub email: Arc<RecordingChannel>,
    pub push: Arc<RecordingChannel>,
}

impl RecordingChannels {
    pub fn new() -> Self {
        Self {
            email: Arc::new(RecordingChannel::new(Channel::Email)),
            push: Arc::new(RecordingChannel::new(Channel::Push)),
        }
    }

    pub fn registry(&self) -> ChannelRegistry {
        ChannelRegistry::new(self.email.clone(), self.push.clone())
    }
}

impl Default for RecordingChannels {
    fn default() -> Self {
        Self::new()
    }
}
