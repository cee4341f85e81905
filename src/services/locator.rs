//! 标记查找服务 - 业务能力层
//!
//! 只负责"在文档正文中找到标记并选中"能力

use futures::FutureExt;
use tracing::debug;

use crate::error::DriverError;
use crate::infrastructure::{DocumentEngine, RetryPolicy};

/// 单次查找的结果
#[derive(Debug, thiserror::Error)]
enum LocateMiss {
    #[error("未找到")]
    NotFound,
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// 标记查找服务
///
/// 每次尝试前把光标移回正文开头，从头向后查找（到末尾回绕）。
/// 已被替换的标记不会再次匹配，所以重复的标记按文档顺序依次命中。
pub struct MarkerLocator {
    policy: RetryPolicy,
}

impl MarkerLocator {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// 找到时标记处于选中状态，返回 true
    ///
    /// 驱动错误按未找到处理（与查找失败一样重试）
    pub async fn locate(&self, engine: &mut dyn DocumentEngine, marker: &str) -> bool {
        let label = format!("查找标记 '{}'", marker);
        let result = self
            .policy
            .run_with(&label, engine, |engine, _attempt| {
                let marker = marker.to_string();
                async move {
                    engine.reset_cursor().await?;
                    if engine.find_next(&marker).await? {
                        Ok(())
                    } else {
                        Err(LocateMiss::NotFound)
                    }
                }
                .boxed()
            })
            .await;

        match result {
            Ok(()) => true,
            Err(exhausted) => {
                debug!(
                    "标记 '{}' 在 {} 次尝试后仍未找到: {}",
                    marker, exhausted.attempts, exhausted.last_error
                );
                false
            }
        }
    }
}
