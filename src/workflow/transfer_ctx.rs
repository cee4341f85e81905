//! 映射处理上下文
//!
//! 封装"我正在把哪个表格文件的映射插入到哪个模板副本"这一信息

use std::fmt::Display;

use crate::models::{FailedItem, FailureReason, RegionMapping};

/// 映射处理上下文
#[derive(Debug, Clone)]
pub struct TransferCtx {
    /// 表格文件名
    pub data_file: String,

    /// 模板副本文件名
    pub template_file: String,

    /// 模板索引（从1开始，仅用于日志显示）
    pub template_index: usize,

    /// 表格文件索引（从1开始，仅用于日志显示）
    pub data_index: usize,
}

impl TransferCtx {
    pub fn new(
        data_file: String,
        template_file: String,
        template_index: usize,
        data_index: usize,
    ) -> Self {
        Self {
            data_file,
            template_file,
            template_index,
            data_index,
        }
    }

    /// 为失败的映射生成失败记录
    pub fn failed_item(
        &self,
        mapping: &RegionMapping,
        marker: &str,
        reason: &FailureReason,
    ) -> FailedItem {
        FailedItem {
            data_file: self.data_file.clone(),
            template_file: self.template_file.clone(),
            marker: marker.to_string(),
            sheet: mapping.sheet.clone(),
            range: mapping.range.clone(),
            stage: reason.stage(),
            reason: reason.to_string(),
        }
    }
}

impl Display for TransferCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[模板#{} 表格#{} {}]",
            self.template_index, self.data_index, self.data_file
        )
    }
}
