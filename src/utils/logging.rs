/// 日志工具模块
///
/// 提供日志初始化以及格式化输出的辅助函数
use std::fs;
use std::path::Path;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use crate::models::TransferResult;

/// 初始化日志系统
///
/// `RUST_LOG` 控制日志级别（默认: info）
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_line_number(true)
        .try_init();
}

/// 初始化测试环境的日志系统
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &Path) -> Result<()> {
    let log_header = format!(
        "{}\n区域插入日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(data_files: usize, template_files: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 表格-文档多文件处理开始");
    info!("📊 表格文件: {} 个", data_files);
    info!("📄 文档文件: {} 个", template_files);
    info!("{}", "=".repeat(60));
}

/// 将耗时格式化为 "x分y秒"
pub fn format_elapsed(elapsed_secs: f64) -> String {
    let total = elapsed_secs.max(0.0) as u64;
    format!("{}分{}秒", total / 60, total % 60)
}

/// 打印最终统计信息
///
/// # 参数
/// - `result`: 处理结果
/// - `report_path`: 报告文件路径
pub fn print_final_stats(result: &TransferResult, report_path: &Path) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("⏱️ 处理时间: {}", format_elapsed(result.elapsed_secs));
    info!("📁 生成的文档: {} 个", result.output_files.len());
    info!("✅ 插入成功: {}", result.inserted_count);
    info!("❌ 插入失败: {}", result.failed_count);

    if !result.output_files.is_empty() {
        info!("\n生成的文件列表:");
        for (idx, file) in result.output_files.iter().enumerate() {
            info!("  {}. {}", idx + 1, file_name(file));
        }
    }

    if !result.failed_items.is_empty() {
        info!("\n{}", "-".repeat(60));
        info!("失败的标记列表:");
        info!("{}", "-".repeat(60));
        for (idx, failed) in result.failed_items.iter().enumerate() {
            info!(
                "{}. 表格: {} → 文档: {}",
                idx + 1,
                failed.data_file,
                failed.template_file
            );
            info!(
                "   标记: {}, 工作表: {}, 区域: {}",
                failed.marker, failed.sheet, failed.range
            );
            info!("   失败原因: {}", failed.reason);
        }
    }

    info!("{}", "=".repeat(60));
    info!("\n报告已保存至: {}", report_path.display());
}

/// 取路径中的文件名部分（用于日志与报告）
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
