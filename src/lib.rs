//! # Range Transfer
//!
//! 把表格文件中配置好的区域以图片形式插入到文档模板的标记位置
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 驱动外部应用程序，只暴露能力
//! - `AutomationDriver` - 创建表格 / 文档引擎句柄
//! - `RetryingHandleFactory` - 带重试的句柄创建，会话守卫保证释放
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个映射
//! - `RegionSnapshotCapturer` - 区域复制能力
//! - `MarkerLocator` / `PlacementEngine` - 标记查找与图片插入能力
//! - `ReportWriter` - 写结果报告能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个映射"的完整处理流程
//! - `TransferCtx` - 上下文封装（模板 + 表格文件）
//! - `TransferFlow` - 流程编排（capture → locate → place）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量处理器，管理驱动和后台任务
//! - `orchestrator/template_processor` - 单个模板处理器，遍历表格文件
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{AutomationDriver, BridgeDriver, MemoryDriver};
pub use models::{FailedItem, RegionConfig, RegionMapping, TransferResult};
pub use orchestrator::{App, RangeTransferOrchestrator};
pub use workflow::{TransferCtx, TransferFlow};
