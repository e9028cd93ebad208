//! 消息模板模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use movie_shared::validation::not_blank;
use validator::Validate;

/// 模板类型：邮件
pub const EMAIL_TEMPLATE_TYPE: &str = "email";

/// 消息模板，(name, type) 唯一
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Template {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub template_type: String,
    pub subject: String,
    /// 含 `{{name}}` 占位符的正文
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 创建模板请求
///
/// 长度上限与 templates 表的列宽一致
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateTemplateRequest {
    #[validate(
        length(min = 1, max = 100, message = "模板名称长度必须在1-100个字符之间"),
        custom(function = "not_blank", message = "模板名称不能为空")
    )]
    pub name: String,
    #[serde(rename = "type")]
    #[validate(
        length(min = 1, max = 50, message = "模板类型长度必须在1-50个字符之间"),
        custom(function = "not_blank", message = "模板类型不能为空")
    )]
    pub template_type: String,
    #[serde(default)]
    #[validate(length(max = 255, message = "模板主题不能超过255个字符"))]
    pub subject: String,
    #[validate(custom(function = "not_blank", message = "模板内容不能为空"))]
    pub content: String,
}

/// 更新模板请求，未提供的字段保持不变
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateTemplateRequest {
    #[validate(
        length(min = 1, max = 100, message = "模板名称长度必须在1-100个字符之间"),
        custom(function = "not_blank", message = "模板名称不能为空")
    )]
    pub name: Option<String>,
    #[serde(rename = "type")]
    #[validate(
        length(min = 1, max = 50, message = "模板类型长度必须在1-50个字符之间"),
        custom(function = "not_blank", message = "模板类型不能为空")
    )]
    pub template_type: Option<String>,
    #[validate(length(max = 255, message = "模板主题不能超过255个字符"))]
    pub subject: Option<String>,
    #[validate(custom(function = "not_blank", message = "模板内容不能为空"))]
    pub content: Option<String>,
}

impl UpdateTemplateRequest {
    /// 应用到现有模板上，返回待保存的新值
    ///
    /// 调用前应先通过 `validate`
    pub fn apply(self, mut template: Template) -> Template {
        if let Some(name) = self.name {
            template.name = name;
        }
        if let Some(template_type) = self.template_type {
            template.template_type = template_type;
        }
        if let Some(subject) = self.subject {
            template.subject = subject;
        }
        if let Some(content) = self.content {
            template.content = content;
        }
        template
    }
}
