//! 领域模型定义

mod enums;
mod notification;
mod preference;
mod template;

pub use enums::{Channel, NotificationStatus};
pub use notification::{CreateNotificationRequest, NewNotification, Notification};
pub use preference::{EffectivePreference, Preference, UpdatePreferenceRequest};
pub use template::{CreateTemplateRequest, EMAIL_TEMPLATE_TYPE, Template, UpdateTemplateRequest};
