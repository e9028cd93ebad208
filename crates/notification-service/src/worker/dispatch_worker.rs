//! 通知派发 Worker
//!
//! 以固定间隔触发派发引擎，直到收到关闭信号。
//! 重叠触发由引擎自身的运行锁拒绝。

use std::sync::Arc;
use std::time::Duration;

use movie_shared::observability::metrics;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::repository::{NotificationRepositoryTrait, PreferenceRepositoryTrait};
use crate::service::DispatchEngine;

const WORKER_NAME: &str = "dispatch_worker";

/// 派发 Worker
pub struct DispatchWorker<NR, PR>
where
    NR: NotificationRepositoryTrait,
    PR: PreferenceRepositoryTrait,
{
    engine: Arc<DispatchEngine<NR, PR>>,
    /// 轮询间隔
    poll_interval: Duration,
}

impl<NR, PR> DispatchWorker<NR, PR>
where
    NR: NotificationRepositoryTrait,
    PR: PreferenceRepositoryTrait,
{
    pub fn new(engine: Arc<DispatchEngine<NR, PR>>, poll_interval: Duration) -> Self {
        Self {
            engine,
            poll_interval,
        }
    }

    /// 主循环：启动后立即运行一次，之后每个间隔运行一次
    ///
    /// shutdown 变为 true（或发送端被丢弃）时退出
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(poll_interval = ?self.poll_interval, "DispatchWorker 已启动");

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("DispatchWorker 已停止");
    }

    async fn run_once(&self) {
        match self.engine.dispatch_pending().await {
            Ok(report) if report.already_running => {}
            Ok(_) => metrics::set_worker_last_run(WORKER_NAME),
            Err(e) => error!(error = %e, "派发运行失败"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Channel, NewNotification, NotificationStatus};
    use crate::repository::{InMemoryNotificationRepository, InMemoryPreferenceRepository};
    use crate::testing::RecordingChannels;
    use movie_shared::cache::{CollectionCache, MemoryCache};
    use movie_shared::config::CacheConfig;

    #[tokio::test(start_paused = true)]
    async fn test_worker_dispatches_on_each_tick_until_shutdown() {
        let notifications = Arc::new(InMemoryNotificationRepository::new());
        let channels = RecordingChannels::new();
        let engine = Arc::new(DispatchEngine::new(
            notifications.clone(),
            Arc::new(InMemoryPreferenceRepository::new()),
            channels.registry(),
            CollectionCache::new(Arc::new(MemoryCache::new()), &CacheConfig::default()),
        ));

        notifications
            .create(&NewNotification::pending(1, "t", "first", "", Channel::Email))
            .await
            .unwrap();

        let (tx, rx) = watch::channel(false);
        let worker = DispatchWorker::new(engine, Duration::from_secs(60));
        let handle = tokio::spawn(async move { worker.run(rx).await });

        // 首次 tick 立即触发
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(channels.email.sent_count(), 1);

        notifications
            .create(&NewNotification::pending(1, "t", "second", "", Channel::Email))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(channels.email.sent_count(), 2);

        tx.send(true).unwrap();
        handle.await.unwrap();

        let stored = notifications.snapshot().await;
        assert!(stored.iter().all(|n| n.status == NotificationStatus::Sent));
    }
}
