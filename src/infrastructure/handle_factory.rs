//! 应用程序句柄工厂 - 基础设施层
//!
//! 负责创建表格 / 文档引擎句柄，并以会话守卫的形式交给上层：
//! - 创建失败时按重试策略重试，两次尝试之间释放平台初始化并做资源回收
//! - 第 1 次尝试使用首选绑定策略，之后使用宽松策略
//! - 会话在任何退出路径上都会释放句柄（包括 panic）

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::HandleCreationError;
use crate::infrastructure::driver::{
    AutomationDriver, BindingStrategy, DocumentEngine, EngineHandle, EngineKind,
    SpreadsheetEngine,
};
use crate::infrastructure::retry::RetryPolicy;

/// 带重试的句柄工厂
#[derive(Clone)]
pub struct RetryingHandleFactory {
    driver: Arc<dyn AutomationDriver>,
    policy: RetryPolicy,
}

impl RetryingHandleFactory {
    pub fn new(driver: Arc<dyn AutomationDriver>, policy: RetryPolicy) -> Self {
        Self { driver, policy }
    }

    pub fn driver(&self) -> &Arc<dyn AutomationDriver> {
        &self.driver
    }

    /// 创建指定类型的句柄并设置为非交互模式
    pub async fn acquire(&self, kind: EngineKind) -> Result<EngineHandle, HandleCreationError> {
        let driver = self.driver.as_ref();
        let label = format!("创建{}应用程序", kind);

        let result = self
            .policy
            .run(&label, |attempt| async move {
                let strategy = if attempt.is_first() {
                    BindingStrategy::Preferred
                } else {
                    BindingStrategy::Permissive
                };
                debug!("{}应用程序: 第 {} 次尝试 ({:?})", kind, attempt.number, strategy);

                let outcome = match driver.launch(kind, strategy).await {
                    Ok(mut handle) => match handle.configure_non_interactive().await {
                        Ok(()) => Ok(handle),
                        Err(e) => {
                            handle.terminate();
                            Err(e)
                        }
                    },
                    Err(e) => Err(e),
                };

                if outcome.is_err() {
                    driver.release_platform().await;
                    driver.sweep().await;
                }
                outcome
            })
            .await;

        match result {
            Ok(handle) => {
                info!("✓ {}应用程序已就绪", kind);
                Ok(handle)
            }
            Err(exhausted) => Err(HandleCreationError {
                kind,
                attempts: exhausted.attempts,
                last_error: exhausted.last_error,
            }),
        }
    }

    pub async fn acquire_spreadsheet(&self) -> Result<SpreadsheetSession, HandleCreationError> {
        let kind = EngineKind::Spreadsheet;
        let engine = self
            .acquire(kind)
            .await?
            .into_spreadsheet()
            .map_err(|e| HandleCreationError {
                kind,
                attempts: 1,
                last_error: e,
            })?;
        Ok(SpreadsheetSession {
            engine,
            driver: self.driver.clone(),
            closed: false,
        })
    }

    pub async fn acquire_document(&self) -> Result<DocumentSession, HandleCreationError> {
        let kind = EngineKind::Document;
        let engine = self
            .acquire(kind)
            .await?
            .into_document()
            .map_err(|e| HandleCreationError {
                kind,
                attempts: 1,
                last_error: e,
            })?;
        Ok(DocumentSession {
            engine,
            driver: self.driver.clone(),
            closed: false,
        })
    }
}

/// 表格引擎会话
///
/// 正常路径调用 `close`（关闭工作簿、退出、资源回收）；
/// 未调用 `close` 就被丢弃时强制终止进程
pub struct SpreadsheetSession {
    engine: Box<dyn SpreadsheetEngine>,
    driver: Arc<dyn AutomationDriver>,
    closed: bool,
}

impl SpreadsheetSession {
    pub fn engine(&mut self) -> &mut dyn SpreadsheetEngine {
        self.engine.as_mut()
    }

    /// 关闭会话，清理错误只记录不返回；重复调用无副作用
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.engine.close_workbook().await {
            debug!("关闭工作簿时出错（已忽略）: {}", e);
        }
        if let Err(e) = self.engine.quit().await {
            warn!("⚠️ 退出表格应用程序时出错: {}", e);
            self.engine.terminate();
        }
        self.driver.sweep().await;
    }
}

impl Drop for SpreadsheetSession {
    fn drop(&mut self) {
        if !self.closed {
            warn!("⚠️ 表格会话未正常关闭，强制终止");
            self.engine.terminate();
        }
    }
}

/// 文档引擎会话，释放规则与 `SpreadsheetSession` 相同
pub struct DocumentSession {
    engine: Box<dyn DocumentEngine>,
    driver: Arc<dyn AutomationDriver>,
    closed: bool,
}

impl DocumentSession {
    pub fn engine(&mut self) -> &mut dyn DocumentEngine {
        self.engine.as_mut()
    }

    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.engine.close_document().await {
            debug!("关闭文档时出错（已忽略）: {}", e);
        }
        if let Err(e) = self.engine.quit().await {
            warn!("⚠️ 退出文档应用程序时出错: {}", e);
            self.engine.terminate();
        }
        self.driver.sweep().await;
    }
}

impl Drop for DocumentSession {
    fn drop(&mut self) {
        if !self.closed {
            warn!("⚠️ 文档会话未正常关闭，强制终止");
            self.engine.terminate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory::MemoryDriver;
    use std::time::Duration;

    fn factory(driver: &MemoryDriver, attempts: usize) -> RetryingHandleFactory {
        RetryingHandleFactory::new(
            Arc::new(driver.clone()),
            RetryPolicy::new(attempts, Duration::ZERO),
        )
    }

    #[tokio::test]
    async fn test_first_attempt_uses_preferred_strategy() {
        let driver = MemoryDriver::new();
        let mut session = factory(&driver, 3).acquire_document().await.unwrap();
        session.close().await;

        let stats = driver.stats();
        assert_eq!(
            stats.launches,
            vec![(EngineKind::Document, BindingStrategy::Preferred)]
        );
        assert_eq!(stats.quits, 1);
        assert_eq!(stats.terminations, 0);
    }

    #[tokio::test]
    async fn test_retries_switch_to_permissive_and_clean_up() {
        let driver = MemoryDriver::new();
        driver.fail_launches(EngineKind::Spreadsheet, 2);

        let mut session = factory(&driver, 3).acquire_spreadsheet().await.unwrap();
        session.close().await;

        let stats = driver.stats();
        assert_eq!(
            stats.launches,
            vec![
                (EngineKind::Spreadsheet, BindingStrategy::Preferred),
                (EngineKind::Spreadsheet, BindingStrategy::Permissive),
                (EngineKind::Spreadsheet, BindingStrategy::Permissive),
            ]
        );
        assert_eq!(stats.platform_releases, 2);
        // 两次失败后的回收 + 会话关闭时的回收
        assert_eq!(stats.sweeps, 3);
    }

    #[tokio::test]
    async fn test_exhausted_budget_reports_attempts() {
        let driver = MemoryDriver::new();
        driver.fail_launches(EngineKind::Document, 5);

        let err = factory(&driver, 3).acquire_document().await.err().unwrap();
        assert_eq!(err.kind, EngineKind::Document);
        assert_eq!(err.attempts, 3);
        assert_eq!(driver.stats().launches.len(), 3);
    }

    #[tokio::test]
    async fn test_dropped_session_is_terminated() {
        let driver = MemoryDriver::new();
        {
            let _session = factory(&driver, 1).acquire_spreadsheet().await.unwrap();
        }
        let stats = driver.stats();
        assert_eq!(stats.terminations, 1);
        assert_eq!(stats.quits, 0);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let driver = MemoryDriver::new();
        let mut session = factory(&driver, 1).acquire_document().await.unwrap();
        session.close().await;
        session.close().await;
        drop(session);

        let stats = driver.stats();
        assert_eq!(stats.quits, 1);
        assert_eq!(stats.sweeps, 1);
        assert_eq!(stats.terminations, 0);
    }
}
