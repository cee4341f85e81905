//! 批量插入处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：初始化日志文件、创建自动化驱动
//! 2. **输入检查**：开始前检查表格 / 文档文件是否都存在
//! 3. **配置加载**：加载（或首次创建）区域配置和后备映射
//! 4. **后台执行**：在独立的 tokio 任务中顺序处理，通过通道回传进度
//! 5. **副本管理**：为每个模板创建 `_copy` 副本，原文件不动
//! 6. **全局统计**：汇总结果、写报告、输出最终统计
//!
//! ## 设计特点
//!
//! - **严格顺序**：传输缓冲区是共享的单槽资源，同一时间只处理一个映射
//! - **资源所有者**：唯一持有自动化驱动的模块
//! - **向下委托**：委托 template_processor 处理单个模板

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::{Config, Timings};
use crate::error::{AppResult, TransferError};
use crate::infrastructure::{AutomationDriver, BridgeDriver, RetryPolicy, RetryingHandleFactory};
use crate::models::{
    load_fallback_mappings, load_or_create_region_config, RegionConfig, RegionMapping,
    TransferLedger, TransferResult,
};
use crate::orchestrator::progress::{CancelFlag, ProgressSink};
use crate::orchestrator::template_processor::{TemplateProcessor, TransferInputs};
use crate::services::{create_working_copies, ReportWriter};
use crate::utils::file_name;
use crate::utils::logging::{init_log_file, log_startup, print_final_stats};
use crate::workflow::TransferFlow;

/// 区域插入编排器
///
/// 模板（外层）→ 表格文件 → 映射（内层），全部顺序执行
pub struct RangeTransferOrchestrator {
    factory: RetryingHandleFactory,
    flow: TransferFlow,
    timings: Timings,
    progress: ProgressSink,
    cancel: CancelFlag,
}

impl RangeTransferOrchestrator {
    pub fn new(driver: Arc<dyn AutomationDriver>, config: &Config) -> Self {
        let policy = RetryPolicy::new(config.retry.handle_attempts, config.timings.handle_backoff);
        Self {
            factory: RetryingHandleFactory::new(driver, policy),
            flow: TransferFlow::new(config),
            timings: config.timings,
            progress: ProgressSink::log_only(),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// 执行一次批处理
    ///
    /// 只有所有模板副本都无法创建时返回错误，其余失败都记入结果
    pub async fn run(
        &self,
        data_files: &[PathBuf],
        template_files: &[PathBuf],
        fallback_mappings: &[RegionMapping],
        region_config: &RegionConfig,
    ) -> Result<TransferResult, TransferError> {
        let started = Instant::now();

        self.progress.emit("📋 正在创建文档副本...");
        let copies = create_working_copies(template_files).await;
        if copies.is_empty() {
            self.progress.emit("❌ 没有可处理的文档副本");
            return Err(TransferError::NoWorkingCopies);
        }
        self.progress
            .emit(format!("✓ 已创建 {} 个文档副本\n", copies.len()));

        let mut ledger = TransferLedger::new();
        for (_, copy) in &copies {
            ledger.record_output(copy.clone());
        }

        let inputs = TransferInputs {
            data_files,
            fallback_mappings,
            region_config,
        };
        let processor = TemplateProcessor::new(
            &self.factory,
            &self.flow,
            self.timings,
            &self.progress,
            &self.cancel,
        );

        let total = copies.len();
        for (idx, (_template, copy)) in copies.iter().enumerate() {
            if self.cancel.is_cancelled() {
                self.progress.emit("⏹️ 已取消，停止处理剩余模板");
                break;
            }

            log_template_start(&self.progress, idx + 1, total, &file_name(copy));
            processor.process(copy, idx + 1, &inputs, &mut ledger).await;

            if idx + 1 < total {
                sleep(self.timings.between_templates).await;
            }
        }

        let result = ledger.finish(started.elapsed(), self.cancel.is_cancelled());
        self.progress.emit(format!(
            "\n✓ 全部处理完成: 成功 {} / 失败 {}",
            result.inserted_count, result.failed_count
        ));
        Ok(result)
    }
}

/// 已加载的批处理输入
#[derive(Debug, Clone)]
pub struct TransferPlan {
    pub data_files: Vec<PathBuf>,
    pub template_files: Vec<PathBuf>,
    pub fallback_mappings: Vec<RegionMapping>,
    pub region_config: RegionConfig,
}

/// 后台批处理任务
pub struct RunHandle {
    /// 进度行
    pub progress: UnboundedReceiver<String>,
    cancel: CancelFlag,
    task: JoinHandle<TransferResult>,
    started: Instant,
}

impl RunHandle {
    /// 请求取消，当前映射完成后生效
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// 等待任务结束
    pub async fn join(self) -> TransferResult {
        match self.task.await {
            Ok(result) => result,
            Err(e) => {
                error!("❌ 后台任务异常结束: {}", e);
                TransferResult::aborted(format!("后台任务异常结束: {}", e), self.started.elapsed())
            }
        }
    }
}

/// 应用主结构
pub struct App {
    config: Config,
    driver: Arc<dyn AutomationDriver>,
}

impl App {
    /// 初始化应用（使用桥接驱动）
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        init_log_file(&config.output_log_file)?;

        log_startup(config.data_files.len(), config.template_files.len());

        let driver: Arc<dyn AutomationDriver> = Arc::new(BridgeDriver::new(&config.bridge_url));
        info!("🔌 自动化桥接服务: {}", config.bridge_url);

        Ok(Self::with_driver(config, driver))
    }

    pub fn with_driver(config: Config, driver: Arc<dyn AutomationDriver>) -> Self {
        Self { config, driver }
    }

    /// 检查输入并加载配置
    pub async fn prepare(&self) -> AppResult<TransferPlan> {
        self.config.validate_inputs()?;

        let region_config = load_or_create_region_config(&self.config.range_config_file).await?;
        info!(
            "✓ 区域配置: {} 个后缀 ({})",
            region_config.len(),
            region_config.suffixes().collect::<Vec<_>>().join(", ")
        );

        let fallback_mappings = match &self.config.fallback_mappings_file {
            Some(path) => load_fallback_mappings(path).await?,
            None => Vec::new(),
        };

        Ok(TransferPlan {
            data_files: self.config.data_files.clone(),
            template_files: self.config.template_files.clone(),
            fallback_mappings,
            region_config,
        })
    }

    /// 在后台任务中执行批处理
    pub fn spawn(&self, plan: TransferPlan) -> RunHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancelFlag::new();
        let started = Instant::now();

        let orchestrator = RangeTransferOrchestrator::new(self.driver.clone(), &self.config)
            .with_progress(ProgressSink::with_channel(tx))
            .with_cancel(cancel.clone());

        let task = tokio::spawn(async move {
            match orchestrator
                .run(
                    &plan.data_files,
                    &plan.template_files,
                    &plan.fallback_mappings,
                    &plan.region_config,
                )
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    error!("❌ 处理中止: {}", e);
                    TransferResult::aborted(e.to_string(), started.elapsed())
                }
            }
        });

        RunHandle {
            progress: rx,
            cancel,
            task,
            started,
        }
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<TransferResult> {
        let plan = self.prepare().await.context("无法开始处理")?;

        let mut handle = self.spawn(plan);
        self.forward_progress(&mut handle.progress).await;
        let result = handle.join().await;

        let writer = ReportWriter::with_path(&self.config.report_file);
        if let Err(e) = writer.write(&result).await {
            warn!("⚠️ 报告写入失败: {:#}", e);
        }

        print_final_stats(&result, writer.path());
        info!("\n日志已保存至: {}", self.config.output_log_file.display());

        Ok(result)
    }

    /// 把进度行追加到输出日志文件，直到后台任务结束
    async fn forward_progress(&self, progress: &mut UnboundedReceiver<String>) {
        let mut log_file = match tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.output_log_file)
            .await
        {
            Ok(file) => Some(file),
            Err(e) => {
                warn!("⚠️ 无法打开输出日志文件: {}", e);
                None
            }
        };

        while let Some(line) = progress.recv().await {
            if let Some(file) = log_file.as_mut() {
                if let Err(e) = file.write_all(format!("{}\n", line).as_bytes()).await {
                    warn!("⚠️ 输出日志写入失败，停止写入: {}", e);
                    log_file = None;
                }
            }
        }

        if let Some(mut file) = log_file {
            if let Err(e) = file.flush().await {
                warn!("⚠️ 输出日志刷新失败: {}", e);
            }
        }
    }
}

// ========== 日志辅助函数 ==========

fn log_template_start(progress: &ProgressSink, index: usize, total: usize, name: &str) {
    progress.emit(format!("\n{}", "=".repeat(60)));
    progress.emit(format!("[{}/{}] 文档文件处理", index, total));
    progress.emit("=".repeat(60));
    progress.emit(format!("文件: {}", name));
}
