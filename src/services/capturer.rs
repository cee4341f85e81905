//! 区域快照服务 - 业务能力层
//!
//! 只负责"把表格区域复制到传输缓冲区"能力，不关心流程

use std::time::Duration;

use tokio::time::sleep;

use crate::error::DriverResult;
use crate::infrastructure::{SheetVisibility, SpreadsheetEngine};

/// 区域快照服务
///
/// 职责：
/// - 按屏幕显示效果渲染区域
/// - 工作表不存在或未处于可见状态时静默返回 false
/// - 写入后等待固定的稳定时间（缓冲区没有就绪信号）
pub struct RegionSnapshotCapturer {
    settle: Duration,
}

impl RegionSnapshotCapturer {
    pub fn new(settle: Duration) -> Self {
        Self { settle }
    }

    pub async fn capture(
        &self,
        engine: &mut dyn SpreadsheetEngine,
        sheet: &str,
        range: &str,
    ) -> DriverResult<bool> {
        match engine.sheet_visibility(sheet).await? {
            Some(SheetVisibility::Visible) => {}
            Some(SheetVisibility::Hidden | SheetVisibility::VeryHidden) | None => return Ok(false),
        }

        engine.copy_range_as_picture(sheet, range).await?;
        sleep(self.settle).await;
        Ok(true)
    }
}
