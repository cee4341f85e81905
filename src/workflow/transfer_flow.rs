//! 映射处理流程 - 流程层
//!
//! 核心职责：定义"一个映射"的完整处理流程
//!
//! 流程顺序：
//! 1. 复制表格区域到传输缓冲区
//! 2. 查找标记 → 粘贴 → 调整尺寸
//! 3. 成功后短暂节流，避免文档应用程序过载

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::Config;
use crate::infrastructure::{DocumentEngine, RetryPolicy, SpreadsheetEngine};
use crate::models::{FailureReason, RegionMapping};
use crate::services::{MarkerLocator, PlacedImage, PlacementEngine, RegionSnapshotCapturer};
use crate::workflow::transfer_ctx::TransferCtx;

/// 映射处理流程
///
/// - 编排"复制 → 插入"两个步骤
/// - 把每一步的失败归类为具体的失败原因
/// - 不持有任何句柄
pub struct TransferFlow {
    capturer: RegionSnapshotCapturer,
    placement: PlacementEngine,
    throttle: Duration,
    verbose_logging: bool,
}

impl TransferFlow {
    pub fn new(config: &Config) -> Self {
        let locator = MarkerLocator::new(RetryPolicy::new(
            config.retry.locate_attempts,
            config.timings.locate_retry_pause,
        ));
        Self {
            capturer: RegionSnapshotCapturer::new(config.timings.capture_settle),
            placement: PlacementEngine::new(locator),
            throttle: config.timings.placement_throttle,
            verbose_logging: config.verbose_logging,
        }
    }

    pub async fn run(
        &self,
        spreadsheet: &mut dyn SpreadsheetEngine,
        document: &mut dyn DocumentEngine,
        mapping: &RegionMapping,
        marker: &str,
        ctx: &TransferCtx,
    ) -> Result<PlacedImage, FailureReason> {
        if self.verbose_logging {
            info!(
                "{} 📋 {}!{} → {}",
                ctx, mapping.sheet, mapping.range, marker
            );
        }

        // 工作表不存在或隐藏时不输出日志，只记入失败列表
        match self
            .capturer
            .capture(spreadsheet, &mapping.sheet, &mapping.range)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                debug!("{} 工作表 {} 不可用", ctx, mapping.sheet);
                return Err(FailureReason::SheetUnavailable);
            }
            Err(e) => return Err(FailureReason::CaptureFailed(e.to_string())),
        }

        let placed = self.placement.locate_and_place(document, marker).await?;
        sleep(self.throttle).await;
        Ok(placed)
    }
}
