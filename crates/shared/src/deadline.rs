//! 存储调用截止时间
//!
//! 每个存储调用都包在截止时间内执行，超时映射为可重试的 [`ServiceError::Timeout`]，
//! 被放弃的调用不会产生部分写入之外的可见副作用（由单语句 SQL 保证）。

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{Result, ServiceError};

/// 在截止时间内执行异步操作
///
/// operation 用于日志和错误信息，建议使用 `仓储.方法` 形式
pub async fn with_deadline<T, Fut>(deadline: Duration, operation: &str, fut: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, deadline_ms = deadline.as_millis() as u64, "Store call exceeded deadline");
            Err(ServiceError::Timeout {
                operation: operation.to_string(),
            })
        }
    }
}
