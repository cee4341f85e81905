//! 报告写入服务 - 业务能力层
//!
//! 只负责"写结果报告"能力，不关心流程

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use crate::models::TransferResult;

#[derive(Serialize)]
struct Report<'a> {
    generated_at: String,
    #[serde(flatten)]
    result: &'a TransferResult,
}

/// 报告写入服务
///
/// 把 `TransferResult` 连同生成时间写成 JSON 文件
pub struct ReportWriter {
    report_path: PathBuf,
}

impl ReportWriter {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            report_path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.report_path
    }

    pub async fn write(&self, result: &TransferResult) -> Result<()> {
        debug!(
            "写入报告: {} | 成功 {} | 失败 {}",
            self.report_path.display(),
            result.inserted_count,
            result.failed_count
        );

        let report = Report {
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            result,
        };
        let json = serde_json::to_string_pretty(&report)?;
        tokio::fs::write(&self.report_path, json)
            .await
            .with_context(|| format!("无法写入报告文件: {}", self.report_path.display()))?;

        Ok(())
    }
}
