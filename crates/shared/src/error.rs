//! 统一错误处理模块
//!
//! 定义通知服务与片单服务共享的错误分类，使用 thiserror 提供良好的错误信息。
//!
//! 分类原则：
//! - 客户端可修正：NotFound / Conflict / Validation / TemplateNotFound
//! - 可重试的基础设施错误：StoreUnavailable / Timeout
//! - 渠道发送失败：SenderFailure（派发引擎将其转化为状态迁移）
//! - 缓存错误：CacheUnavailable（只在缓存层内部出现，不会越过缓存边界）

use thiserror::Error;

/// 服务错误类型
#[derive(Debug, Error)]
pub enum ServiceError {
    // ==================== 客户端错误 ====================
    #[error("记录未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    #[error("记录冲突: {entity} {detail}")]
    Conflict { entity: String, detail: String },

    #[error("参数验证失败: {0}")]
    Validation(String),

    #[error("模板未找到: name={name}, type={template_type}")]
    TemplateNotFound { name: String, template_type: String },

    // ==================== 存储错误 ====================
    #[error("数据库错误: {0}")]
    StoreUnavailable(#[from] sqlx::Error),

    #[error("操作超时: {operation}")]
    Timeout { operation: String },

    // ==================== 渠道错误 ====================
    #[error("渠道发送失败: 渠道={channel}, 原因={reason}")]
    SenderFailure { channel: String, reason: String },

    #[error("模板渲染失败: {0}")]
    Render(String),

    // ==================== 缓存错误 ====================
    #[error("缓存不可用: {0}")]
    CacheUnavailable(String),

    // ==================== 通用错误 ====================
    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, ServiceError>;

impl ServiceError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn conflict(entity: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Conflict {
            entity: entity.into(),
            detail: detail.into(),
        }
    }

    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::TemplateNotFound { .. } => "TEMPLATE_NOT_FOUND",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::Timeout { .. } => "TIMEOUT",
            Self::SenderFailure { .. } => "SENDER_FAILURE",
            Self::Render(_) => "RENDER_ERROR",
            Self::CacheUnavailable(_) => "CACHE_UNAVAILABLE",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试错误
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::Timeout { .. })
    }

    /// 是否为客户端可修正的错误
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::Conflict { .. }
                | Self::Validation(_)
                | Self::TemplateNotFound { .. }
        )
    }

    /// 对外展示的错误信息
    ///
    /// 服务端错误统一返回通用描述，不泄露内部细节
    pub fn public_message(&self) -> String {
        if self.is_client_error() {
            self.to_string()
        } else {
            "服务内部错误，请稍后重试".to_string()
        }
    }

    /// 将数据库唯一约束冲突（SQLSTATE 23505）映射为 Conflict
    pub fn from_insert(err: sqlx::Error, entity: &str, detail: impl Into<String>) -> Self {
        let is_unique_violation = err
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| code == "23505");

        if is_unique_violation {
            Self::conflict(entity, detail)
        } else {
            Self::StoreUnavailable(err)
        }
    }
}

/// 从 validator 错误转换，保留字段级错误信息
impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}
