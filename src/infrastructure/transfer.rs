//! 传输缓冲区
//!
//! 表格引擎渲染的图片经由一个共享的单槽缓冲区（相当于系统剪贴板）交给文档引擎。
//! 写入是异步完成的，没有"已就绪"信号，只能在写入后等待一段稳定时间。
//! 这是一个已知的弱同步点，因此只通过驱动接口访问它。

use std::sync::{Arc, Mutex};

use crate::infrastructure::driver::ImageSize;

/// 缓冲区中的区域快照
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// 来源描述（`工作表!区域`）
    pub source: String,
    pub size: ImageSize,
}

/// 单槽传输缓冲区，新写入覆盖旧内容，读取不清空
#[derive(Debug, Clone, Default)]
pub struct TransferBuffer {
    slot: Arc<Mutex<Option<Snapshot>>>,
}

impl TransferBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, snapshot: Snapshot) {
        *self.lock() = Some(snapshot);
    }

    /// 读取当前内容（与剪贴板一致，读取后内容仍保留）
    pub fn peek(&self) -> Option<Snapshot> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Snapshot>> {
        // 槽中只有普通数据，中毒后继续使用
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
