//! 单个模板处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块负责处理一个模板副本，是模板级别的编排器。
//!
//! ## 核心功能
//!
//! 1. **文档会话**：整个模板只打开一次文档应用程序，跨所有表格文件复用
//! 2. **遍历表格文件**：提取后缀，选择映射集合，每个表格文件一个表格会话
//! 3. **流程调度**：对每个映射调用 `TransferFlow`
//! 4. **保存与清理**：保存失败只记为警告，会话在任何路径上都会关闭
//!
//! 会话状态：`Idle → Opening → OpenFailed | Open → ProcessingDataFiles → Saving → Closed`

use std::fmt;
use std::path::{Path, PathBuf};

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::Timings;
use crate::infrastructure::{DocumentEngine, RetryingHandleFactory};
use crate::models::{DataFileSuffix, FailureReason, RegionConfig, RegionMapping, TransferLedger};
use crate::orchestrator::progress::{CancelFlag, ProgressSink};
use crate::utils::file_name;
use crate::workflow::{TransferCtx, TransferFlow};

/// 一次批处理的输入
#[derive(Debug, Clone, Copy)]
pub struct TransferInputs<'a> {
    pub data_files: &'a [PathBuf],
    /// 区域配置中缺少某个后缀时使用
    pub fallback_mappings: &'a [RegionMapping],
    pub region_config: &'a RegionConfig,
}

impl<'a> TransferInputs<'a> {
    /// 按后缀选择映射集合，返回 (映射, 是否使用后备映射)
    pub fn mappings_for(&self, suffix: &DataFileSuffix) -> (&'a [RegionMapping], bool) {
        match self.region_config.mappings_for(suffix) {
            Some(set) => (set, false),
            None => (self.fallback_mappings, true),
        }
    }
}

/// 模板会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Opening,
    OpenFailed,
    Open,
    ProcessingDataFiles,
    Saving,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// 单个模板处理器
pub struct TemplateProcessor<'a> {
    factory: &'a RetryingHandleFactory,
    flow: &'a TransferFlow,
    timings: Timings,
    progress: &'a ProgressSink,
    cancel: &'a CancelFlag,
}

impl<'a> TemplateProcessor<'a> {
    pub fn new(
        factory: &'a RetryingHandleFactory,
        flow: &'a TransferFlow,
        timings: Timings,
        progress: &'a ProgressSink,
        cancel: &'a CancelFlag,
    ) -> Self {
        Self {
            factory,
            flow,
            timings,
            progress,
            cancel,
        }
    }

    /// 处理一个模板副本，返回会话的最终状态
    pub async fn process(
        &self,
        copy: &Path,
        template_index: usize,
        inputs: &TransferInputs<'_>,
        ledger: &mut TransferLedger,
    ) -> SessionState {
        let template_file = file_name(copy);
        let mut state = SessionState::Idle;

        transition(&mut state, SessionState::Opening, &template_file);
        let mut session = match self.factory.acquire_document().await {
            Ok(session) => session,
            Err(e) => {
                transition(&mut state, SessionState::OpenFailed, &template_file);
                self.progress.emit(format!("❌ 无法启动文档应用程序: {}", e));
                ledger.record_skipped_template(&template_file, e.to_string());
                return state;
            }
        };

        if let Err(e) = session.engine().open_document(copy).await {
            transition(&mut state, SessionState::OpenFailed, &template_file);
            self.progress
                .emit(format!("❌ 无法打开文档 {}: {}", template_file, e));
            ledger.record_skipped_template(&template_file, e.to_string());
            session.close().await;
            return state;
        }
        transition(&mut state, SessionState::Open, &template_file);
        self.progress.emit("✓ 文档已打开");

        transition(&mut state, SessionState::ProcessingDataFiles, &template_file);
        let total = inputs.data_files.len();
        for (idx, data_file) in inputs.data_files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                self.progress.emit("⏹️ 已取消，停止处理剩余表格文件");
                break;
            }

            let ctx = TransferCtx::new(
                file_name(data_file),
                template_file.clone(),
                template_index,
                idx + 1,
            );
            self.progress.emit(format!(
                "\n  [{}/{}] 表格文件: {}",
                idx + 1,
                total,
                ctx.data_file
            ));

            self.process_data_file(session.engine(), data_file, &ctx, inputs, ledger)
                .await;
            sleep(self.timings.between_data_files).await;
        }

        transition(&mut state, SessionState::Saving, &template_file);
        sleep(self.timings.before_save).await;
        match session.engine().save().await {
            Ok(()) => self.progress.emit(format!("\n✓ 文档已保存: {}", template_file)),
            Err(e) => {
                warn!("✗ 文档保存失败 {}: {}", template_file, e);
                ledger.record_warning(format!("{} 保存失败: {}", template_file, e));
            }
        }

        session.close().await;
        transition(&mut state, SessionState::Closed, &template_file);
        state
    }

    /// 处理一个表格文件的所有映射
    async fn process_data_file(
        &self,
        document: &mut dyn DocumentEngine,
        data_file: &Path,
        ctx: &TransferCtx,
        inputs: &TransferInputs<'_>,
        ledger: &mut TransferLedger,
    ) {
        let Some(suffix) = DataFileSuffix::from_path(data_file) else {
            self.progress.emit("  ⚠️ 找不到后缀，跳过该文件");
            ledger.record_warning(format!("{} 没有后缀，已跳过", ctx.data_file));
            return;
        };
        self.progress.emit(format!("  ✓ 后缀: {}", suffix));

        let (mappings, is_fallback) = inputs.mappings_for(&suffix);
        if is_fallback {
            self.progress
                .emit(format!("  ⚠️ {} 没有配置，使用后备映射 ({} 项)", suffix, mappings.len()));
            ledger.record_warning(format!(
                "{}: {} 没有配置，使用了后备映射",
                ctx.data_file, suffix
            ));
        } else {
            self.progress
                .emit(format!("  ✓ 使用 {} 配置 ({} 项)", suffix, mappings.len()));
        }

        let mut session = match self.factory.acquire_spreadsheet().await {
            Ok(session) => session,
            Err(e) => {
                self.progress.emit(format!("  ❌ 无法启动表格应用程序: {}", e));
                fail_all(ctx, &suffix, mappings, &e.to_string(), ledger);
                return;
            }
        };

        if let Err(e) = session.engine().open_workbook(data_file).await {
            self.progress
                .emit(format!("  ❌ 无法打开表格文件 {}: {}", ctx.data_file, e));
            fail_all(ctx, &suffix, mappings, &e.to_string(), ledger);
            session.close().await;
            return;
        }
        self.progress.emit("  ✓ 表格文件已打开");

        for mapping in mappings {
            if self.cancel.is_cancelled() {
                self.progress.emit("  ⏹️ 已取消，停止处理剩余映射");
                break;
            }

            let marker = mapping.marker_for(&suffix);
            match self
                .flow
                .run(session.engine(), document, mapping, &marker, ctx)
                .await
            {
                Ok(_) => ledger.record_success(),
                Err(reason) => ledger.record_failure(ctx.failed_item(mapping, &marker, &reason)),
            }
        }

        session.close().await;
    }
}

/// 数据文件无法打开：其映射集合中的每一项都记为失败
fn fail_all(
    ctx: &TransferCtx,
    suffix: &DataFileSuffix,
    mappings: &[RegionMapping],
    error: &str,
    ledger: &mut TransferLedger,
) {
    let reason = FailureReason::DataSourceUnavailable(error.to_string());
    for mapping in mappings {
        let marker = mapping.marker_for(suffix);
        ledger.record_failure(ctx.failed_item(mapping, &marker, &reason));
    }
}

fn transition(state: &mut SessionState, next: SessionState, template_file: &str) {
    debug!("{}: {} → {}", template_file, state, next);
    *state = next;
}
