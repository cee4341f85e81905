//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量插入处理器
//! - 管理应用生命周期（初始化、检查输入、运行、写报告）
//! - 创建模板副本
//! - 在后台任务中顺序处理所有模板，通过通道回传进度
//! - 输出全局统计信息
//!
//! ### `template_processor` - 单个模板处理器
//! - 持有文档会话，遍历所有表格文件
//! - 每个表格文件一个表格会话
//! - 保存副本，记录警告
//!
//! ### `progress` - 进度输出与取消标志
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<模板>)
//!     ↓
//! template_processor (处理 Vec<表格文件>)
//!     ↓
//! workflow::TransferFlow (处理单个映射)
//!     ↓
//! services (能力层：capture / locate / place / report)
//!     ↓
//! infrastructure (基础设施：AutomationDriver)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：batch_processor 管批量，template_processor 管单个模板
//! 2. **资源隔离**：只有编排层持有应用程序会话
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure

pub mod batch_processor;
pub mod progress;
pub mod template_processor;

// 重新导出主要类型
pub use batch_processor::{App, RangeTransferOrchestrator, RunHandle, TransferPlan};
pub use progress::{CancelFlag, ProgressSink};
pub use template_processor::{SessionState, TemplateProcessor, TransferInputs};
