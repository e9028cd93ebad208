//! 内存仓储实现
//!
//! 用于本地开发与集成测试，行为与 Postgres 实现保持一致：
//! 排序规则、唯一约束冲突、状态迁移条件都相同。
//! 可通过 `set_unavailable` 模拟存储故障。

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::traits::{
    NotificationRepositoryTrait, PreferenceRepositoryTrait, TemplateRepositoryTrait,
};
use crate::error::{Result, ServiceError};
use crate::models::{
    CreateTemplateRequest, NewNotification, Notification, NotificationStatus, Preference, Template,
};

fn unavailable() -> ServiceError {
    ServiceError::StoreUnavailable(sqlx::Error::PoolTimedOut)
}

fn check(flag: &AtomicBool) -> Result<()> {
    if flag.load(Ordering::SeqCst) {
        Err(unavailable())
    } else {
        Ok(())
    }
}

// ==================== 通知 ====================

#[derive(Default)]
pub struct InMemoryNotificationRepository {
    rows: RwLock<Vec<Notification>>,
    next_id: AtomicI64,
    unavailable: AtomicBool,
}

impl InMemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// 当前所有记录（按 id 排序）
    pub async fn snapshot(&self) -> Vec<Notification> {
        self.rows.read().await.clone()
    }
}

#[async_trait]
impl NotificationRepositoryTrait for InMemoryNotificationRepository {
    async fn create(&self, notification: &NewNotification) -> Result<Notification> {
        check(&self.unavailable)?;

        let created = Notification {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            user_id: notification.user_id,
            notification_type: notification.notification_type.clone(),
            title: notification.title.clone(),
            content: notification.content.clone(),
            status: notification.status,
            channel: notification.channel,
            created_at: Utc::now(),
            sent_at: notification.sent_at,
            read_at: None,
        };
        self.rows.write().await.push(created.clone());
        Ok(created)
    }

    async fn get(&self, id: i64) -> Result<Option<Notification>> {
        check(&self.unavailable)?;
        Ok(self.rows.read().await.iter().find(|n| n.id == id).cloned())
    }

    async fn list_by_user(&self, user_id: i64, limit: i64) -> Result<Vec<Notification>> {
        check(&self.unavailable)?;

        let mut items: Vec<_> = self
            .rows
            .read()
            .await
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        items.truncate(limit.max(0) as usize);
        Ok(items)
    }

    async fn list_pending(&self, limit: i64) -> Result<Vec<Notification>> {
        check(&self.unavailable)?;

        let mut items: Vec<_> = self
            .rows
            .read()
            .await
            .iter()
            .filter(|n| n.status == NotificationStatus::Pending)
            .cloned()
            .collect();
        items.sort_by_key(|n| (n.created_at, n.id));
        items.truncate(limit.max(0) as usize);
        Ok(items)
    }

    async fn update_status(&self, id: i64, status: NotificationStatus) -> Result<bool> {
        check(&self.unavailable)?;

        let mut rows = self.rows.write().await;
        match rows
            .iter_mut()
            .find(|n| n.id == id && n.status == NotificationStatus::Pending)
        {
            Some(row) => {
                row.status = status;
                if status == NotificationStatus::Sent {
                    row.sent_at = Some(Utc::now());
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_read(&self, id: i64) -> Result<Option<Notification>> {
        check(&self.unavailable)?;

        let mut rows = self.rows.write().await;
        Ok(rows.iter_mut().find(|n| n.id == id).map(|row| {
            row.read_at.get_or_insert_with(Utc::now);
            row.clone()
        }))
    }

    async fn delete(&self, id: i64) -> Result<Option<i64>> {
        check(&self.unavailable)?;

        let mut rows = self.rows.write().await;
        let position = rows.iter().position(|n| n.id == id);
        Ok(position.map(|idx| rows.remove(idx).user_id))
    }
}

// ==================== 模板 ====================

#[derive(Default)]
pub struct InMemoryTemplateRepository {
    rows: RwLock<Vec<Template>>,
    next_id: AtomicI64,
    unavailable: AtomicBool,
}

impl InMemoryTemplateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置默认邮件模板，与数据库初始化写入的内容一致
    pub async fn with_default_templates() -> Self {
        let repo = Self::new();
        for (name, template_type, subject, content) in movie_shared::database::DEFAULT_TEMPLATES {
            let request = CreateTemplateRequest {
                name: name.to_string(),
                template_type: template_type.to_string(),
                subject: subject.to_string(),
                content: content.to_string(),
            };
            // 空仓储中默认模板互不冲突
            let _ = repo.create(&request).await;
        }
        repo
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

fn template_conflict(name: &str, template_type: &str) -> ServiceError {
    ServiceError::conflict("Template", format!("name={}, type={}", name, template_type))
}

#[async_trait]
impl TemplateRepositoryTrait for InMemoryTemplateRepository {
    async fn list(&self) -> Result<Vec<Template>> {
        check(&self.unavailable)?;

        let mut items = self.rows.read().await.clone();
        items.sort_by(|a, b| {
            (a.name.as_str(), a.template_type.as_str())
                .cmp(&(b.name.as_str(), b.template_type.as_str()))
        });
        Ok(items)
    }

    async fn get(&self, id: i64) -> Result<Option<Template>> {
        check(&self.unavailable)?;
        Ok(self.rows.read().await.iter().find(|t| t.id == id).cloned())
    }

    async fn find_by_name(&self, name: &str, template_type: &str) -> Result<Option<Template>> {
        check(&self.unavailable)?;
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .find(|t| t.name == name && t.template_type == template_type)
            .cloned())
    }

    async fn create(&self, request: &CreateTemplateRequest) -> Result<Template> {
        check(&self.unavailable)?;

        let mut rows = self.rows.write().await;
        if rows
            .iter()
            .any(|t| t.name == request.name && t.template_type == request.template_type)
        {
            return Err(template_conflict(&request.name, &request.template_type));
        }

        let now = Utc::now();
        let template = Template {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            name: request.name.clone(),
            template_type: request.template_type.clone(),
            subject: request.subject.clone(),
            content: request.content.clone(),
            created_at: now,
            updated_at: now,
        };
        rows.push(template.clone());
        Ok(template)
    }

    async fn update(&self, template: &Template) -> Result<Option<Template>> {
        check(&self.unavailable)?;

        let mut rows = self.rows.write().await;
        if rows.iter().any(|t| {
            t.id != template.id
                && t.name == template.name
                && t.template_type == template.template_type
        }) {
            return Err(template_conflict(&template.name, &template.template_type));
        }

        Ok(rows.iter_mut().find(|t| t.id == template.id).map(|row| {
            row.name = template.name.clone();
            row.template_type = template.template_type.clone();
            row.subject = template.subject.clone();
            row.content = template.content.clone();
            row.updated_at = Utc::now();
            row.clone()
        }))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        check(&self.unavailable)?;

        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|t| t.id != id);
        Ok(rows.len() != before)
    }
}

// ==================== 偏好 ====================

#[derive(Default)]
pub struct InMemoryPreferenceRepository {
    rows: RwLock<Vec<Preference>>,
    next_id: AtomicI64,
    unavailable: AtomicBool,
}

impl InMemoryPreferenceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// 已持久化的记录数
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl PreferenceRepositoryTrait for InMemoryPreferenceRepository {
    async fn find_by_user(&self, user_id: i64) -> Result<Option<Preference>> {
        check(&self.unavailable)?;
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .find(|p| p.user_id == user_id)
            .cloned())
    }

    async fn upsert(
        &self,
        user_id: i64,
        email_enabled: bool,
        push_enabled: bool,
    ) -> Result<Preference> {
        check(&self.unavailable)?;

        let mut rows = self.rows.write().await;
        let now = Utc::now();
        if let Some(row) = rows.iter_mut().find(|p| p.user_id == user_id) {
            row.email_enabled = email_enabled;
            row.push_enabled = push_enabled;
            row.updated_at = now;
            return Ok(row.clone());
        }

        let preference = Preference {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            user_id,
            email_enabled,
            push_enabled,
            created_at: now,
            updated_at: now,
        };
        rows.push(preference.clone());
        Ok(preference)
    }
}
