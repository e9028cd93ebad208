//! 派发引擎
//!
//! 批量处理 pending 通知：解析用户偏好，调用渠道发送，迁移状态。
//!
//! ## 状态机
//!
//! ```text
//! pending --(发送成功)--> sent（记录 sent_at）
//! pending --(发送失败)--> failed
//! ```
//!
//! 用户关闭对应渠道（或渠道全局禁用）时跳过发送，状态保持 pending，下次运行重新评估。
//! failed 不会被自动重新入队。
//!
//! 同一进程内同时只允许一次运行，重叠的触发直接返回 `already_running` 报告。

use std::sync::Arc;
use std::time::{Duration, Instant};

use movie_shared::cache::{CacheKey, CollectionCache};
use movie_shared::deadline::with_deadline;
use movie_shared::observability::metrics;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::channels::ChannelRegistry;
use crate::error::Result;
use crate::models::{Notification, NotificationStatus};
use crate::repository::{NotificationRepositoryTrait, PreferenceRepositoryTrait};

use super::preference_service::effective_preference;
use super::DEFAULT_STORE_TIMEOUT;

/// 单次运行的默认批量大小
pub const DEFAULT_BATCH_SIZE: i64 = 100;

/// 单次派发运行报告
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// 已有运行在进行，本次未处理任何通知
    pub already_running: bool,
    pub fetched: usize,
    pub sent: usize,
    pub failed: usize,
    /// 渠道被关闭，保持 pending
    pub skipped: usize,
    /// 偏好查询或状态更新失败，通知保持原状
    pub errors: usize,
}

impl DispatchReport {
    fn overlapping() -> Self {
        Self {
            already_running: true,
            ..Default::default()
        }
    }

    fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Sent => self.sent += 1,
            ItemOutcome::Failed => self.failed += 1,
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Error => self.errors += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Sent,
    Failed,
    Skipped,
    Error,
}

impl ItemOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Error => "error",
        }
    }
}

/// 派发引擎
pub struct DispatchEngine<NR, PR>
where
    NR: NotificationRepositoryTrait,
    PR: PreferenceRepositoryTrait,
{
    notification_repo: Arc<NR>,
    preference_repo: Arc<PR>,
    channels: ChannelRegistry,
    cache: CollectionCache,
    batch_size: i64,
    store_timeout: Duration,
    /// 运行互斥锁
    run_guard: Mutex<()>,
}

impl<NR, PR> DispatchEngine<NR, PR>
where
    NR: NotificationRepositoryTrait,
    PR: PreferenceRepositoryTrait,
{
    pub fn new(
        notification_repo: Arc<NR>,
        preference_repo: Arc<PR>,
        channels: ChannelRegistry,
        cache: CollectionCache,
    ) -> Self {
        Self {
            notification_repo,
            preference_repo,
            channels,
            cache,
            batch_size: DEFAULT_BATCH_SIZE,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            run_guard: Mutex::new(()),
        }
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    /// 处理一批 pending 通知（先创建先处理）
    ///
    /// 拉取批次失败时返回错误；单条通知的失败不会中断其余通知的处理
    #[instrument(skip(self))]
    pub async fn dispatch_pending(&self) -> Result<DispatchReport> {
        let Ok(_guard) = self.run_guard.try_lock() else {
            warn!("Dispatch already running, skipping overlapping trigger");
            return Ok(DispatchReport::overlapping());
        };

        let started = Instant::now();
        let pending = with_deadline(
            self.store_timeout,
            "notifications.list_pending",
            self.notification_repo.list_pending(self.batch_size),
        )
        .await?;

        let mut report = DispatchReport {
            fetched: pending.len(),
            ..Default::default()
        };

        for notification in &pending {
            let outcome = self.process(notification).await;
            metrics::record_dispatch(notification.channel.as_str(), outcome.as_str());
            report.record(outcome);
        }

        metrics::record_dispatch_run(started.elapsed().as_secs_f64());
        info!(
            fetched = report.fetched,
            sent = report.sent,
            failed = report.failed,
            skipped = report.skipped,
            errors = report.errors,
            "Dispatch run complete"
        );

        Ok(report)
    }

    /// 处理单条通知
    async fn process(&self, notification: &Notification) -> ItemOutcome {
        let preference = match effective_preference(
            self.preference_repo.as_ref(),
            notification.user_id,
            self.store_timeout,
        )
        .await
        {
            Ok(preference) => preference,
            Err(e) => {
                error!(
                    notification_id = notification.id,
                    user_id = notification.user_id,
                    error = %e,
                    "Failed to resolve preferences, leaving notification pending"
                );
                return ItemOutcome::Error;
            }
        };

        let sender = self.channels.sender(notification.channel);
        if !preference.allows(notification.channel) || !sender.is_enabled() {
            debug!(
                notification_id = notification.id,
                channel = %notification.channel,
                "Channel disabled, notification stays pending"
            );
            return ItemOutcome::Skipped;
        }

        let to = sender.recipient_for(notification.user_id);
        let (status, outcome) = match sender.send(&to, &notification.title, &notification.content).await {
            Ok(()) => (NotificationStatus::Sent, ItemOutcome::Sent),
            Err(e) => {
                error!(
                    notification_id = notification.id,
                    channel = %notification.channel,
                    error = %e,
                    "Notification send failed"
                );
                (NotificationStatus::Failed, ItemOutcome::Failed)
            }
        };

        match with_deadline(
            self.store_timeout,
            "notifications.update_status",
            self.notification_repo.update_status(notification.id, status),
        )
        .await
        {
            Ok(true) => {
                self.cache
                    .invalidate(&CacheKey::notifications(notification.user_id))
                    .await;
                outcome
            }
            Ok(false) => {
                warn!(
                    notification_id = notification.id,
                    "Notification left pending state before its status could be updated"
                );
                ItemOutcome::Error
            }
            Err(e) => {
                error!(
                    notification_id = notification.id,
                    status = %status,
                    error = %e,
                    "Failed to update notification status"
                );
                ItemOutcome::Error
            }
        }
    }
}
