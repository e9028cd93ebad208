//! 请求校验辅助
//!
//! 供 `#[validate(custom(function = "not_blank"))]` 使用，长度与范围规则直接写在 DTO 上。

use validator::ValidationError;

/// 拒绝空串与纯空白
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}
