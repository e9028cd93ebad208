//! 通知服务
//!
//! 负责通知记录的创建、查询、已读标记，以及基于模板的邮件直发。
//!
//! ## 缓存策略
//!
//! 用户通知列表走旁路缓存（TTL 5 分钟）。所有修改用户通知集合的操作
//! 在返回前删除该用户的缓存键，保证同一进程内写后读不会读到旧数据。

use std::sync::Arc;
use std::time::Duration;

use movie_shared::cache::{CacheKey, CollectionCache};
use movie_shared::deadline::with_deadline;
use movie_shared::observability::metrics;
use tracing::{error, info, instrument, warn};
use validator::Validate;

use crate::channels::ChannelRegistry;
use crate::error::{Result, ServiceError};
use crate::models::{
    Channel, CreateNotificationRequest, EMAIL_TEMPLATE_TYPE, NewNotification, Notification,
};
use crate::repository::{
    NotificationRepositoryTrait, PreferenceRepositoryTrait, TemplateRepositoryTrait,
};
use crate::template::{TemplateData, TemplateEngine};

use super::preference_service::effective_preference;
use super::{DEFAULT_STORE_TIMEOUT, validate_user_id};

/// 用户通知列表返回的最大条数
pub const NOTIFICATION_LIST_LIMIT: i64 = 50;

/// 预置模板名称
pub mod template_names {
    pub const MOVIE_RECOMMENDATION: &str = "movie_recommendation";
    pub const WATCHLIST_REMINDER: &str = "watchlist_reminder";
    pub const NEW_RELEASE: &str = "new_release";
    pub const RATING_REMINDER: &str = "rating_reminder";
}

/// 模板直发结果
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatedSend {
    /// 已发送。记录写入失败时 notification 为 None（发送不回滚）
    Delivered { notification: Option<Notification> },
    /// 用户关闭了邮件通知，未发送也未记录
    OptedOut,
}

impl TemplatedSend {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// 通知服务
pub struct NotificationService<NR, TR, PR>
where
    NR: NotificationRepositoryTrait,
    TR: TemplateRepositoryTrait,
    PR: PreferenceRepositoryTrait,
{
    notification_repo: Arc<NR>,
    template_repo: Arc<TR>,
    preference_repo: Arc<PR>,
    channels: ChannelRegistry,
    cache: CollectionCache,
    engine: TemplateEngine,
    store_timeout: Duration,
}

impl<NR, TR, PR> NotificationService<NR, TR, PR>
where
    NR: NotificationRepositoryTrait,
    TR: TemplateRepositoryTrait,
    PR: PreferenceRepositoryTrait,
{
    pub fn new(
        notification_repo: Arc<NR>,
        template_repo: Arc<TR>,
        preference_repo: Arc<PR>,
        channels: ChannelRegistry,
        cache: CollectionCache,
    ) -> Self {
        Self {
            notification_repo,
            template_repo,
            preference_repo,
            channels,
            cache,
            engine: TemplateEngine::new(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    // ==================== 通知记录 ====================

    /// 创建待发送通知
    #[instrument(skip(self, request), fields(user_id = request.user_id))]
    pub async fn create_notification(&self, request: CreateNotificationRequest) -> Result<Notification> {
        request.validate()?;
        let notification = self.insert(request.into_new()).await?;

        info!(notification_id = notification.id, "Notification created");
        Ok(notification)
    }

    /// 获取用户最近的通知（最多 50 条，按创建时间倒序）
    #[instrument(skip(self))]
    pub async fn get_user_notifications(&self, user_id: i64) -> Result<Vec<Notification>> {
        validate_user_id(user_id)?;

        let key = CacheKey::notifications(user_id);
        self.cache
            .read_through(&key, || {
                with_deadline(
                    self.store_timeout,
                    "notifications.list_by_user",
                    self.notification_repo
                        .list_by_user(user_id, NOTIFICATION_LIST_LIMIT),
                )
            })
            .await
    }

    pub async fn get_notification(&self, id: i64) -> Result<Notification> {
        with_deadline(self.store_timeout, "notifications.get", self.notification_repo.get(id))
            .await?
            .ok_or_else(|| ServiceError::not_found("Notification", id))
    }

    /// 标记已读，重复标记保留首次时间
    #[instrument(skip(self))]
    pub async fn mark_read(&self, id: i64) -> Result<Notification> {
        let notification = with_deadline(
            self.store_timeout,
            "notifications.mark_read",
            self.notification_repo.mark_read(id),
        )
        .await?
        .ok_or_else(|| ServiceError::not_found("Notification", id))?;

        self.cache
            .invalidate(&CacheKey::notifications(notification.user_id))
            .await;
        Ok(notification)
    }

    /// 删除通知（管理操作）
    #[instrument(skip(self))]
    pub async fn delete_notification(&self, id: i64) -> Result<()> {
        let user_id = with_deadline(
            self.store_timeout,
            "notifications.delete",
            self.notification_repo.delete(id),
        )
        .await?
        .ok_or_else(|| ServiceError::not_found("Notification", id))?;

        self.cache.invalidate(&CacheKey::notifications(user_id)).await;
        info!(notification_id = id, user_id, "Notification deleted");
        Ok(())
    }

    async fn insert(&self, new: NewNotification) -> Result<Notification> {
        let user_id = new.user_id;
        let notification = with_deadline(
            self.store_timeout,
            "notifications.create",
            self.notification_repo.create(&new),
        )
        .await?;

        self.cache.invalidate(&CacheKey::notifications(user_id)).await;
        Ok(notification)
    }

    // ==================== 模板直发 ====================

    /// 按模板渲染并直接发送邮件
    ///
    /// 1. 按 (name, "email") 查找模板，不存在返回 TemplateNotFound
    /// 2. 用户关闭邮件时静默返回 OptedOut
    /// 3. 严格渲染主题和正文
    /// 4. 直接调用邮件渠道，失败向调用方返回错误，不写记录
    /// 5. 成功后写入 sent 状态的通知记录；写入失败只记录日志
    #[instrument(skip(self, data))]
    pub async fn send_templated(
        &self,
        user_id: i64,
        template_name: &str,
        data: &TemplateData,
    ) -> Result<TemplatedSend> {
        validate_user_id(user_id)?;

        let result = self.send_templated_inner(user_id, template_name, data).await;
        let status = match &result {
            Ok(TemplatedSend::Delivered { .. }) => "sent",
            Ok(TemplatedSend::OptedOut) => "opted_out",
            Err(e) => e.code(),
        };
        metrics::record_templated_send(template_name, status);
        result
    }

    async fn send_templated_inner(
        &self,
        user_id: i64,
        template_name: &str,
        data: &TemplateData,
    ) -> Result<TemplatedSend> {
        let template = with_deadline(
            self.store_timeout,
            "templates.find_by_name",
            self.template_repo
                .find_by_name(template_name, EMAIL_TEMPLATE_TYPE),
        )
        .await?
        .ok_or_else(|| ServiceError::TemplateNotFound {
            name: template_name.to_string(),
            template_type: EMAIL_TEMPLATE_TYPE.to_string(),
        })?;

        let preference =
            effective_preference(self.preference_repo.as_ref(), user_id, self.store_timeout)
                .await?;
        if !preference.email_enabled {
            info!(user_id, template = template_name, "Email disabled by user, skipping");
            return Ok(TemplatedSend::OptedOut);
        }

        let rendered = self.engine.render_template(&template, data)?;

        if let Err(e) = self
            .channels
            .deliver(Channel::Email, user_id, &rendered.subject, &rendered.body)
            .await
        {
            error!(user_id, template = template_name, error = %e, "Templated email send failed");
            return Err(e);
        }

        let record = NewNotification::delivered(
            user_id,
            template_name,
            rendered.subject,
            rendered.body,
            Channel::Email,
        );
        let notification = match self.insert(record).await {
            Ok(notification) => Some(notification),
            Err(e) => {
                error!(
                    user_id,
                    template = template_name,
                    error = %e,
                    "Email sent but notification record could not be saved"
                );
                None
            }
        };

        info!(user_id, template = template_name, "Templated email sent");
        Ok(TemplatedSend::Delivered { notification })
    }

    // ==================== 预置流程 ====================

    pub async fn send_movie_recommendation(
        &self,
        user_id: i64,
        username: &str,
        movie_title: &str,
    ) -> Result<TemplatedSend> {
        let data = template_data(&[("username", username), ("movie_title", movie_title)]);
        self.send_templated(user_id, template_names::MOVIE_RECOMMENDATION, &data)
            .await
    }

    pub async fn send_watchlist_reminder(
        &self,
        user_id: i64,
        username: &str,
        count: usize,
    ) -> Result<TemplatedSend> {
        if count == 0 {
            warn!(user_id, "Watchlist reminder requested for an empty watchlist");
        }
        let count = count.to_string();
        let data = template_data(&[("username", username), ("count", count.as_str())]);
        self.send_templated(user_id, template_names::WATCHLIST_REMINDER, &data)
            .await
    }

    pub async fn send_new_release(
        &self,
        user_id: i64,
        username: &str,
        movie_title: &str,
    ) -> Result<TemplatedSend> {
        let data = template_data(&[("username", username), ("movie_title", movie_title)]);
        self.send_templated(user_id, template_names::NEW_RELEASE, &data)
            .await
    }

    pub async fn send_rating_reminder(
        &self,
        user_id: i64,
        username: &str,
        movie_title: &str,
    ) -> Result<TemplatedSend> {
        let data = template_data(&[("username", username), ("movie_title", movie_title)]);
        self.send_templated(user_id, template_names::RATING_REMINDER, &data)
            .await
    }
}

fn template_data(pairs: &[(&str, &str)]) -> TemplateData {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NotificationStatus, Preference, Template};
    use crate::repository::{
        InMemoryNotificationRepository, InMemoryPreferenceRepository, InMemoryTemplateRepository,
        MockNotificationRepositoryTrait, MockPreferenceRepositoryTrait,
        MockTemplateRepositoryTrait,
    };
    use crate::testing::RecordingChannels;
    use chrono::Utc;
    use movie_shared::cache::MemoryCache;
    use movie_shared::config::CacheConfig;

    fn cache() -> CollectionCache {
        CollectionCache::new(Arc::new(MemoryCache::new()), &CacheConfig::default())
    }

    fn recommendation_template() -> Template {
        Template {
            id: 1,
            name: "movie_recommendation".to_string(),
            template_type: "email".to_string(),
            subject: "New Movie Recommendation".to_string(),
            content: "Hi {{username}}, we have a new movie recommendation for you: {{movie_title}}"
                .to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn opted_out(user_id: i64) -> Preference {
        Preference {
            id: 1,
            user_id,
            email_enabled: false,
            push_enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_missing_template_is_not_found_and_nothing_sent() {
        let mut templates = MockTemplateRepositoryTrait::new();
        templates.expect_find_by_name().returning(|_, _| Ok(None));
        let mut notifications = MockNotificationRepositoryTrait::new();
        notifications.expect_create().never();
        let channels = RecordingChannels::new();

        let service = NotificationService::new(
            Arc::new(notifications),
            Arc::new(templates),
            Arc::new(InMemoryPreferenceRepository::new()),
            channels.registry(),
            cache(),
        );

        let err = service
            .send_movie_recommendation(3, "alice", "Dune")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::TemplateNotFound { ref name, .. } if name == "movie_recommendation"));
        assert!(!err.is_retryable());
        assert_eq!(channels.email.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_opted_out_user_is_silent_noop() {
        let mut templates = MockTemplateRepositoryTrait::new();
        templates
            .expect_find_by_name()
            .returning(|_, _| Ok(Some(recommendation_template())));
        let mut preferences = MockPreferenceRepositoryTrait::new();
        preferences
            .expect_find_by_user()
            .returning(|user_id| Ok(Some(opted_out(user_id))));
        let mut notifications = MockNotificationRepositoryTrait::new();
        notifications.expect_create().never();
        let channels = RecordingChannels::new();

        let service = NotificationService::new(
            Arc::new(notifications),
            Arc::new(templates),
            Arc::new(preferences),
            channels.registry(),
            cache(),
        );

        let outcome = service
            .send_movie_recommendation(3, "alice", "Dune")
            .await
            .unwrap();
        assert_eq!(outcome, TemplatedSend::OptedOut);
        assert_eq!(channels.email.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_send_failure_surfaces_and_creates_no_record() {
        let mut notifications = MockNotificationRepositoryTrait::new();
        notifications.expect_create().never();
        let channels = RecordingChannels::new();
        channels.email.set_failing(true);

        let service = NotificationService::new(
            Arc::new(notifications),
            Arc::new(InMemoryTemplateRepository::with_default_templates().await),
            Arc::new(InMemoryPreferenceRepository::new()),
            channels.registry(),
            cache(),
        );

        let err = service.send_new_release(5, "bob", "Arrival").await.unwrap_err();
        assert!(matches!(err, ServiceError::SenderFailure { .. }));
    }

    #[tokio::test]
    async fn test_record_failure_after_send_is_not_propagated() {
        let mut notifications = MockNotificationRepositoryTrait::new();
        notifications
            .expect_create()
            .times(1)
            .returning(|_| Err(ServiceError::StoreUnavailable(sqlx::Error::PoolTimedOut)));
        let channels = RecordingChannels::new();

        let service = NotificationService::new(
            Arc::new(notifications),
            Arc::new(InMemoryTemplateRepository::with_default_templates().await),
            Arc::new(InMemoryPreferenceRepository::new()),
            channels.registry(),
            cache(),
        );

        let outcome = service
            .send_rating_reminder(8, "dana", "Heat")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            TemplatedSend::Delivered { notification: None }
        );
        assert_eq!(channels.email.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_placeholder_is_render_error() {
        let channels = RecordingChannels::new();
        let service = NotificationService::new(
            Arc::new(InMemoryNotificationRepository::new()),
            Arc::new(InMemoryTemplateRepository::with_default_templates().await),
            Arc::new(InMemoryPreferenceRepository::new()),
            channels.registry(),
            cache(),
        );

        let data = template_data(&[("username", "erin")]);
        let err = service
            .send_templated(2, template_names::NEW_RELEASE, &data)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Render(_)));
        assert_eq!(channels.email.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_watchlist_reminder_renders_count() {
        let channels = RecordingChannels::new();
        let repo = Arc::new(InMemoryNotificationRepository::new());
        let service = NotificationService::new(
            repo.clone(),
            Arc::new(InMemoryTemplateRepository::with_default_templates().await),
            Arc::new(InMemoryPreferenceRepository::new()),
            channels.registry(),
            cache(),
        );

        let outcome = service.send_watchlist_reminder(6, "finn", 3).await.unwrap();
        assert!(outcome.is_delivered());

        let sent = channels.email.sent();
        assert_eq!(sent[0].to, "user6@example.com");
        assert_eq!(sent[0].subject, "Movies in Your Watchlist");
        assert!(sent[0].body.contains("you have 3 movies"));

        let stored = repo.snapshot().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, NotificationStatus::Sent);
        assert_eq!(stored[0].notification_type, "watchlist_reminder");
        assert!(stored[0].sent_at.is_some());
    }

    #[tokio::test]
    async fn test_mark_read_and_delete_missing_are_not_found() {
        let service = NotificationService::new(
            Arc::new(InMemoryNotificationRepository::new()),
            Arc::new(InMemoryTemplateRepository::new()),
            Arc::new(InMemoryPreferenceRepository::new()),
            RecordingChannels::new().registry(),
            cache(),
        );

        assert!(matches!(
            service.mark_read(404).await,
            Err(ServiceError::NotFound { .. })
        ));
        assert!(matches!(
            service.delete_notification(404).await,
            Err(ServiceError::NotFound { .. })
        ));
        assert!(matches!(
            service.get_notification(404).await,
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_request_never_touches_store() {
        let mut notifications = MockNotificationRepositoryTrait::new();
        notifications.expect_create().never();

        let service = NotificationService::new(
            Arc::new(notifications),
            Arc::new(InMemoryTemplateRepository::new()),
            Arc::new(InMemoryPreferenceRepository::new()),
            RecordingChannels::new().registry(),
            cache(),
        );

        let err = service
            .create_notification(CreateNotificationRequest {
                user_id: -1,
                notification_type: "t".to_string(),
                title: "x".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(err.is_client_error());
    }

    fn sized_request(type_len: usize, title_len: usize) -> CreateNotificationRequest {
        CreateNotificationRequest {
            user_id: 7,
            notification_type: "x".repeat(type_len),
            title: "t".repeat(title_len),
            ..Default::default()
        }
    }

    fn service_without_store_access() -> NotificationService<
        MockNotificationRepositoryTrait,
        InMemoryTemplateRepository,
        InMemoryPreferenceRepository,
    > {
        let mut notifications = MockNotificationRepositoryTrait::new();
        notifications.expect_create().never();
        NotificationService::new(
            Arc::new(notifications),
            Arc::new(InMemoryTemplateRepository::new()),
            Arc::new(InMemoryPreferenceRepository::new()),
            RecordingChannels::new().registry(),
            cache(),
        )
    }

    #[tokio::test]
    async fn test_oversized_type_rejected_before_store() {
        let err = service_without_store_access()
            .create_notification(sized_request(51, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_oversized_title_rejected_before_store() {
        let err = service_without_store_access()
            .create_notification(sized_request(10, 256))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_column_width_fields_are_accepted() {
        let service = NotificationService::new(
            Arc::new(InMemoryNotificationRepository::new()),
            Arc::new(InMemoryTemplateRepository::new()),
            Arc::new(InMemoryPreferenceRepository::new()),
            RecordingChannels::new().registry(),
            cache(),
        );

        let created = service
            .create_notification(sized_request(50, 255))
            .await
            .unwrap();
        assert_eq!(created.notification_type.chars().count(), 50);
        assert_eq!(created.title.chars().count(), 255);
        assert_eq!(created.status, NotificationStatus::Pending);
    }

    #[tokio::test]
    async fn test_go_style_seed_template_renders() {
        let mut templates = MockTemplateRepositoryTrait::new();
        templates.expect_find_by_name().returning(|_, _| {
            Ok(Some(Template {
                content: "Hi {{.Username}}, we have a new movie recommendation for you: {{.MovieTitle}}"
                    .to_string(),
                ..recommendation_template()
            }))
        });
        let channels = RecordingChannels::new();

        let service = NotificationService::new(
            Arc::new(InMemoryNotificationRepository::new()),
            Arc::new(templates),
            Arc::new(InMemoryPreferenceRepository::new()),
            channels.registry(),
            cache(),
        );

        let outcome = service
            .send_movie_recommendation(3, "alice", "Dune")
            .await
            .unwrap();
        assert!(matches!(outcome, TemplatedSend::Delivered { notification: Some(_) }));

        let sent = channels.email.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].body,
            "Hi alice, we have a new movie recommendation for you: Dune"
        );
    }
}
