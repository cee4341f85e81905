//! 处理结果与失败记录

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 单个映射失败时所处的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStage {
    /// 打开数据文件
    Open,
    /// 复制表格区域
    Capture,
    /// 查找标记
    Locate,
    /// 粘贴并调整图片
    Place,
}

impl fmt::Display for TransferStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferStage::Open => "打开",
            TransferStage::Capture => "复制",
            TransferStage::Locate => "查找",
            TransferStage::Place => "插入",
        };
        f.write_str(name)
    }
}

/// 单个映射的失败原因
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// 数据文件无法打开
    DataSourceUnavailable(String),
    /// 工作表不存在或处于隐藏状态
    SheetUnavailable,
    /// 复制区域时发生错误
    CaptureFailed(String),
    /// 文档中找不到标记
    MarkerNotFound,
    /// 标记下方没有可用空间
    NoVerticalSpace { available: f64 },
    /// 粘贴后找不到图片对象（传输缓冲区为空或粘贴失败）
    NoImageAfterPaste,
    /// 插入图片时发生错误
    PlacementFailed(String),
}

impl FailureReason {
    pub fn stage(&self) -> TransferStage {
        match self {
            FailureReason::DataSourceUnavailable(_) => TransferStage::Open,
            FailureReason::SheetUnavailable | FailureReason::CaptureFailed(_) => {
                TransferStage::Capture
            }
            FailureReason::MarkerNotFound => TransferStage::Locate,
            FailureReason::NoVerticalSpace { .. }
            | FailureReason::NoImageAfterPaste
            | FailureReason::PlacementFailed(_) => TransferStage::Place,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::DataSourceUnavailable(e) => write!(f, "无法打开数据文件: {}", e),
            FailureReason::SheetUnavailable => {
                write!(f, "表格区域复制失败 (工作表不存在或已隐藏)")
            }
            FailureReason::CaptureFailed(e) => write!(f, "表格区域复制失败: {}", e),
            FailureReason::MarkerNotFound => write!(f, "在文档中找不到标记"),
            FailureReason::NoVerticalSpace { available } => {
                write!(f, "标记下方没有可用空间 (可用高度 {:.1}pt)", available)
            }
            FailureReason::NoImageAfterPaste => {
                write!(f, "粘贴后找不到图片对象 (传输缓冲区为空或粘贴失败)")
            }
            FailureReason::PlacementFailed(e) => write!(f, "图片插入失败: {}", e),
        }
    }
}

/// 失败记录，每个失败的映射对应一条
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedItem {
    pub data_file: String,
    pub template_file: String,
    pub marker: String,
    pub sheet: String,
    pub range: String,
    pub stage: TransferStage,
    pub reason: String,
}

/// 未能处理的模板
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedTemplate {
    pub template_file: String,
    pub reason: String,
}

/// 一次批处理的结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferResult {
    /// 批处理是否执行完毕（不代表所有映射都成功）
    pub success: bool,
    /// 致命错误信息
    pub message: Option<String>,
    /// 是否被取消
    pub cancelled: bool,
    pub inserted_count: usize,
    pub failed_count: usize,
    pub failed_items: Vec<FailedItem>,
    pub output_files: Vec<PathBuf>,
    pub skipped_templates: Vec<SkippedTemplate>,
    /// 非致命警告（如保存失败）
    pub warnings: Vec<String>,
    pub elapsed_secs: f64,
}

impl TransferResult {
    /// 批处理在开始前即终止
    pub fn aborted(message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            elapsed_secs: elapsed.as_secs_f64(),
            ..Default::default()
        }
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_secs_f64(self.elapsed_secs.max(0.0))
    }

    /// 实际尝试过的映射数量
    pub fn attempted_count(&self) -> usize {
        self.inserted_count + self.failed_count
    }
}

/// 结果台账：在批处理过程中累积成功数与失败记录
#[derive(Debug, Default)]
pub struct TransferLedger {
    inserted: usize,
    failed_items: Vec<FailedItem>,
    output_files: Vec<PathBuf>,
    skipped_templates: Vec<SkippedTemplate>,
    warnings: Vec<String>,
}

impl TransferLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self) {
        self.inserted += 1;
    }

    pub fn record_failure(&mut self, item: FailedItem) {
        self.failed_items.push(item);
    }

    pub fn record_output(&mut self, path: PathBuf) {
        self.output_files.push(path);
    }

    pub fn record_skipped_template(&mut self, template_file: impl Into<String>, reason: impl Into<String>) {
        self.skipped_templates.push(SkippedTemplate {
            template_file: template_file.into(),
            reason: reason.into(),
        });
    }

    pub fn record_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn inserted_count(&self) -> usize {
        self.inserted
    }

    pub fn failed_count(&self) -> usize {
        self.failed_items.len()
    }

    pub fn finish(self, elapsed: Duration, cancelled: bool) -> TransferResult {
        TransferResult {
            success: true,
            message: None,
            cancelled,
            inserted_count: self.inserted,
            failed_count: self.failed_items.len(),
            failed_items: self.failed_items,
            output_files: self.output_files,
            skipped_templates: self.skipped_templates,
            warnings: self.warnings,
            elapsed_secs: elapsed.as_secs_f64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(marker: &str, reason: FailureReason) -> FailedItem {
        FailedItem {
            data_file: "proj_#1.xlsx".to_string(),
            template_file: "report_copy.docx".to_string(),
            marker: marker.to_string(),
            sheet: "S1".to_string(),
            range: "B1:C2".to_string(),
            stage: reason.stage(),
            reason: reason.to_string(),
        }
    }

    #[test]
    fn test_ledger_counts_reconcile() {
        let mut ledger = TransferLedger::new();
        ledger.record_success();
        ledger.record_success();
        ledger.record_failure(failed("A_#1", FailureReason::MarkerNotFound));
        ledger.record_output(PathBuf::from("report_copy.docx"));

        let result = ledger.finish(Duration::from_millis(1500), false);
        assert!(result.success);
        assert_eq!(result.inserted_count, 2);
        assert_eq!(result.failed_count, 1);
        assert_eq!(result.attempted_count(), 3);
        assert_eq!(result.failed_items[0].stage, TransferStage::Locate);
        assert_eq!(result.elapsed(), Duration::from_millis(1500));
    }

    #[test]
    fn test_failure_stage_mapping() {
        assert_eq!(FailureReason::SheetUnavailable.stage(), TransferStage::Capture);
        assert_eq!(
            FailureReason::DataSourceUnavailable("x".into()).stage(),
            TransferStage::Open
        );
        assert_eq!(FailureReason::NoImageAfterPaste.stage(), TransferStage::Place);
    }

    #[test]
    fn test_failed_item_serialized_shape() {
        let item = failed("A_#2", FailureReason::SheetUnavailable);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["data_file"], "proj_#1.xlsx");
        assert_eq!(json["template_file"], "report_copy.docx");
        assert_eq!(json["marker"], "A_#2");
        assert_eq!(json["stage"], "capture");
        assert!(json["reason"].as_str().unwrap().contains("工作表"));
    }

    #[test]
    fn test_aborted_result() {
        let result = TransferResult::aborted("模板副本创建失败", Duration::from_secs(2));
        assert!(!result.success);
        assert_eq!(result.attempted_count(), 0);
        assert_eq!(result.message.as_deref(), Some("模板副本创建失败"));
    }
}
