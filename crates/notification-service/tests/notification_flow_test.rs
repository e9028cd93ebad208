//! 通知流程集成测试
//!
//! 使用内存仓储、内存缓存和记录型渠道组装完整服务（无需外部依赖）

use std::sync::Arc;

use movie_shared::cache::{CacheKey, CollectionCache, MemoryCache};
use movie_shared::config::CacheConfig;
use notification_service::repository::{
    InMemoryNotificationRepository, InMemoryPreferenceRepository, InMemoryTemplateRepository,
    PreferenceRepositoryTrait,
};
use notification_service::testing::RecordingChannels;
use notification_service::{
    Channel, CreateNotificationRequest, DispatchEngine, NotificationService, NotificationStatus,
    PreferenceService, ServiceError, TemplatedSend, UpdatePreferenceRequest,
};

// ==================== 测试环境 ====================

struct TestEnv {
    notifications: Arc<InMemoryNotificationRepository>,
    preferences: Arc<InMemoryPreferenceRepository>,
    cache_backend: Arc<MemoryCache>,
    channels: RecordingChannels,
    service: NotificationService<
        InMemoryNotificationRepository,
        InMemoryTemplateRepository,
        InMemoryPreferenceRepository,
    >,
    engine: DispatchEngine<InMemoryNotificationRepository, InMemoryPreferenceRepository>,
    preference_service: PreferenceService<InMemoryPreferenceRepository>,
}

impl TestEnv {
    async fn new() -> Self {
        let notifications = Arc::new(InMemoryNotificationRepository::new());
        let templates = Arc::new(InMemoryTemplateRepository::with_default_templates().await);
        let preferences = Arc::new(InMemoryPreferenceRepository::new());
        let cache_backend = Arc::new(MemoryCache::new());
        let cache = CollectionCache::new(cache_backend.clone(), &CacheConfig::default());
        let channels = RecordingChannels::new();

        let service = NotificationService::new(
            notifications.clone(),
            templates,
            preferences.clone(),
            channels.registry(),
            cache.clone(),
        );
        let engine = DispatchEngine::new(
            notifications.clone(),
            preferences.clone(),
            channels.registry(),
            cache,
        );
        let preference_service = PreferenceService::new(preferences.clone());

        Self {
            notifications,
            preferences,
            cache_backend,
            channels,
            service,
            engine,
            preference_service,
        }
    }

    async fn create(&self, user_id: i64, channel: Channel) -> i64 {
        self.service
            .create_notification(CreateNotificationRequest {
                user_id,
                notification_type: "new_release".to_string(),
                title: "New Movie Release".to_string(),
                content: "Dune is out".to_string(),
                channel: Some(channel),
            })
            .await
            .unwrap()
            .id
    }
}

// ==================== 偏好 ====================

#[tokio::test]
async fn test_default_preferences_are_not_persisted() {
    let env = TestEnv::new().await;

    let pref = env.preference_service.get_preferences(11).await.unwrap();
    assert!(pref.email_enabled);
    assert!(pref.push_enabled);
    assert!(env.preferences.is_empty().await);
}

// ==================== 派发场景 ====================

#[tokio::test]
async fn test_disabled_email_stays_pending_until_enabled() {
    let env = TestEnv::new().await;
    env.preference_service
        .update_preferences(
            7,
            UpdatePreferenceRequest {
                email_enabled: Some(false),
                push_enabled: None,
            },
        )
        .await
        .unwrap();

    let id = env.create(7, Channel::Email).await;

    let report = env.engine.dispatch_pending().await.unwrap();
    assert_eq!(report.skipped, 1);
    let n = env.service.get_notification(id).await.unwrap();
    assert_eq!(n.status, NotificationStatus::Pending);
    assert!(n.sent_at.is_none());

    env.preference_service
        .update_preferences(
            7,
            UpdatePreferenceRequest {
                email_enabled: Some(true),
                push_enabled: None,
            },
        )
        .await
        .unwrap();

    let report = env.engine.dispatch_pending().await.unwrap();
    assert_eq!(report.sent, 1);
    let n = env.service.get_notification(id).await.unwrap();
    assert_eq!(n.status, NotificationStatus::Sent);
    assert!(n.sent_at.is_some());
    assert_eq!(env.channels.email.sent()[0].to, "user7@example.com");
}

#[tokio::test]
async fn test_movie_recommendation_sends_and_records() {
    let env = TestEnv::new().await;

    let outcome = env
        .service
        .send_movie_recommendation(3, "alice", "Dune")
        .await
        .unwrap();

    let sent = env.channels.email.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "New Movie Recommendation");
    assert!(sent[0].body.contains("alice"));
    assert!(sent[0].body.contains("Dune"));

    let TemplatedSend::Delivered {
        notification: Some(record),
    } = outcome
    else {
        panic!("expected a delivered notification record");
    };
    assert_eq!(record.user_id, 3);
    assert_eq!(record.status, NotificationStatus::Sent);
    assert_eq!(record.title, "New Movie Recommendation");

    let history = env.service.get_user_notifications(3).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, record.id);
}

#[tokio::test]
async fn test_concurrent_dispatch_runs_never_double_send() {
    let env = TestEnv::new().await;
    for user_id in 1..=20 {
        env.create(user_id, Channel::Push).await;
    }

    let (a, b) = futures::join!(env.engine.dispatch_pending(), env.engine.dispatch_pending());
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.sent + b.sent, 20);
    assert_eq!(env.channels.push.sent_count(), 20);
}

// ==================== 缓存一致性 ====================

#[tokio::test]
async fn test_read_after_write_sees_new_notification() {
    let env = TestEnv::new().await;

    assert!(env.service.get_user_notifications(5).await.unwrap().is_empty());
    assert!(env.cache_backend.contains(CacheKey::notifications(5).as_str()));

    let id = env.create(5, Channel::Email).await;
    assert!(!env.cache_backend.contains(CacheKey::notifications(5).as_str()));

    let listed = env.service.get_user_notifications(5).await.unwrap();
    assert_eq!(listed.iter().map(|n| n.id).collect::<Vec<_>>(), vec![id]);
}

#[tokio::test]
async fn test_status_transition_and_mark_read_invalidate() {
    let env = TestEnv::new().await;
    let id = env.create(9, Channel::Email).await;

    let before = env.service.get_user_notifications(9).await.unwrap();
    assert_eq!(before[0].status, NotificationStatus::Pending);

    env.engine.dispatch_pending().await.unwrap();
    let after = env.service.get_user_notifications(9).await.unwrap();
    assert_eq!(after[0].status, NotificationStatus::Sent);

    env.service.mark_read(id).await.unwrap();
    let read = env.service.get_user_notifications(9).await.unwrap();
    assert!(read[0].is_read());

    env.service.delete_notification(id).await.unwrap();
    assert!(env.service.get_user_notifications(9).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cache_hit_does_not_touch_store() {
    let env = TestEnv::new().await;
    env.create(4, Channel::Email).await;

    let first = env.service.get_user_notifications(4).await.unwrap();
    env.notifications.set_unavailable(true);

    let cached = env.service.get_user_notifications(4).await.unwrap();
    assert_eq!(first, cached);
}

#[tokio::test]
async fn test_cache_outage_never_fails_reads_or_writes() {
    let env = TestEnv::new().await;
    env.cache_backend.set_unavailable(true);

    let id = env.create(6, Channel::Email).await;
    let listed = env.service.get_user_notifications(6).await.unwrap();
    assert_eq!(listed[0].id, id);

    env.engine.dispatch_pending().await.unwrap();
    assert_eq!(
        env.service.get_user_notifications(6).await.unwrap()[0].status,
        NotificationStatus::Sent
    );
}

#[tokio::test]
async fn test_store_outage_surfaces_retryable_error() {
    let env = TestEnv::new().await;
    env.notifications.set_unavailable(true);

    let err = env.service.get_user_notifications(2).await.unwrap_err();
    assert!(matches!(err, ServiceError::StoreUnavailable(_)));
    assert!(err.is_retryable());
    assert!(!err.public_message().contains("pool"));
}

#[tokio::test]
async fn test_listing_returns_latest_fifty() {
    let env = TestEnv::new().await;
    let mut last = 0;
    for _ in 0..55 {
        last = env.create(12, Channel::Email).await;
    }

    let listed = env.service.get_user_notifications(12).await.unwrap();
    assert_eq!(listed.len(), 50);
    assert_eq!(listed[0].id, last);
}

#[tokio::test]
async fn test_opt_out_via_preferences_blocks_canned_flows() {
    let env = TestEnv::new().await;
    env.preferences.upsert(21, false, true).await.unwrap();

    let outcome = env.service.send_new_release(21, "gus", "Alien").await.unwrap();
    assert_eq!(outcome, TemplatedSend::OptedOut);
    assert_eq!(env.channels.email.sent_count(), 0);
    assert!(env.service.get_user_notifications(21).await.unwrap().is_empty());
}
