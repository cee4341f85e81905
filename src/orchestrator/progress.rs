//! 进度输出与取消标志
//!
//! 后台任务通过通道把可读的进度行发送给调用方，同时写入日志；
//! 取消标志只在模板、表格文件、映射之间检查

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

/// 进度输出
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<UnboundedSender<String>>,
}

impl ProgressSink {
    /// 只写日志
    pub fn log_only() -> Self {
        Self { tx: None }
    }

    pub fn with_channel(tx: UnboundedSender<String>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn emit(&self, line: impl Into<String>) {
        let line = line.into();
        info!("{}", line);
        if let Some(tx) = &self.tx {
            // 接收端已关闭时丢弃
            let _ = tx.send(line);
        }
    }
}

/// 取消标志，克隆后共享
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
