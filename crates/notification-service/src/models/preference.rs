//! 用户通知偏好模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::enums::Channel;

/// 已持久化的偏好记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Preference {
    pub id: i64,
    pub user_id: i64,
    pub email_enabled: bool,
    pub push_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 生效偏好
///
/// 在可空查询结果之上计算得到。没有记录时两个渠道都启用，且不写入存储
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePreference {
    pub user_id: i64,
    pub email_enabled: bool,
    pub push_enabled: bool,
    /// 是否来自已持久化的记录
    pub persisted: bool,
}

impl EffectivePreference {
    pub fn default_for(user_id: i64) -> Self {
        Self {
            user_id,
            email_enabled: true,
            push_enabled: true,
            persisted: false,
        }
    }

    pub fn resolve(user_id: i64, stored: Option<&Preference>) -> Self {
        match stored {
            Some(p) => Self {
                user_id,
                email_enabled: p.email_enabled,
                push_enabled: p.push_enabled,
                persisted: true,
            },
            None => Self::default_for(user_id),
        }
    }

    /// 用户是否允许通过该渠道接收通知
    pub fn allows(&self, channel: Channel) -> bool {
        match channel {
            Channel::Email => self.email_enabled,
            Channel::Push => self.push_enabled,
        }
    }
}

/// 偏好更新请求（部分更新）
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UpdatePreferenceRequest {
    pub email_enabled: Option<bool>,
    pub push_enabled: Option<bool>,
}

impl UpdatePreferenceRequest {
    pub fn apply(&self, current: EffectivePreference) -> (bool, bool) {
        (
            self.email_enabled.unwrap_or(current.email_enabled),
            self.push_enabled.unwrap_or(current.push_enabled),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_row_defaults_to_all_enabled() {
        let pref = EffectivePreference::resolve(42, None);
        assert!(pref.email_enabled);
        assert!(pref.push_enabled);
        assert!(!pref.persisted);
        assert!(pref.allows(Channel::Email));
        assert!(pref.allows(Channel::Push));
    }

    #[test]
    fn test_stored_row_wins() {
        let stored = Preference {
            id: 1,
            user_id: 7,
            email_enabled: false,
            push_enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let pref = EffectivePreference::resolve(7, Some(&stored));
        assert!(!pref.allows(Channel::Email));
        assert!(pref.allows(Channel::Push));
        assert!(pref.persisted);
    }

    #[test]
    fn test_partial_update_keeps_unset_fields() {
        let current = EffectivePreference {
            user_id: 1,
            email_enabled: false,
            push_enabled: false,
            persisted: true,
        };
        let req = UpdatePreferenceRequest {
            email_enabled: Some(true),
            push_enabled: None,
        };
        assert_eq!(req.apply(current), (true, false));
    }
}
