//! 自动化驱动接口 - 基础设施层
//!
//! 把"两个外部编辑应用程序"抽象为能力接口，编排层不接触任何平台绑定。
//! 实现者：`BridgeDriver`（HTTP 桥接服务）、`MemoryDriver`（内存模拟）

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{DriverError, DriverResult};

/// 外部应用程序种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// 表格引擎
    Spreadsheet,
    /// 文档引擎
    Document,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Spreadsheet => f.write_str("表格"),
            EngineKind::Document => f.write_str("文档"),
        }
    }
}

/// 句柄绑定策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingStrategy {
    /// 首选：使用预生成的接口缓存
    Preferred,
    /// 宽松：容忍过期的接口缓存
    Permissive,
}

/// 工作表可见状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetVisibility {
    Visible,
    Hidden,
    VeryHidden,
}

/// 页面几何信息（单位: pt）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub page_height: f64,
    pub top_margin: f64,
    pub bottom_margin: f64,
}

impl PageGeometry {
    /// 正文区域底部位置
    pub fn content_end(&self) -> f64 {
        self.page_height - self.bottom_margin
    }
}

/// 图片尺寸（单位: pt）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: f64,
    pub height: f64,
}

impl ImageSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// 高宽比
    pub fn aspect_ratio(&self) -> f64 {
        self.height / self.width
    }
}

/// 文档中内嵌图片的引用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(pub u64);

/// 表格引擎句柄
#[async_trait]
pub trait SpreadsheetEngine: Send {
    /// 设置为非交互模式（不可见、不弹出提示）
    async fn configure_non_interactive(&mut self) -> DriverResult<()>;

    async fn open_workbook(&mut self, path: &Path) -> DriverResult<()>;

    /// 工作表可见状态，工作表不存在时返回 `None`
    async fn sheet_visibility(&mut self, sheet: &str) -> DriverResult<Option<SheetVisibility>>;

    /// 按屏幕显示效果把区域渲染为图片，写入传输缓冲区
    async fn copy_range_as_picture(&mut self, sheet: &str, range: &str) -> DriverResult<()>;

    /// 关闭工作簿（不保存）
    async fn close_workbook(&mut self) -> DriverResult<()>;

    async fn quit(&mut self) -> DriverResult<()>;

    /// 强制终止应用程序进程（同步，尽力而为）
    fn terminate(&mut self);
}

/// 文档引擎句柄
#[async_trait]
pub trait DocumentEngine: Send {
    async fn configure_non_interactive(&mut self) -> DriverResult<()>;

    async fn open_document(&mut self, path: &Path) -> DriverResult<()>;

    /// 光标移到正文开头
    async fn reset_cursor(&mut self) -> DriverResult<()>;

    /// 从光标向后精确查找（非正则），到达末尾时回绕一次；找到时选中匹配文本
    async fn find_next(&mut self, text: &str) -> DriverResult<bool>;

    async fn page_geometry(&mut self) -> DriverResult<PageGeometry>;

    /// 选区在页面上的垂直位置
    async fn selection_vertical_offset(&mut self) -> DriverResult<f64>;

    /// 选区所在范围在页面上的垂直位置
    async fn range_vertical_offset(&mut self) -> DriverResult<f64>;

    /// 用文本替换选区内容，选区随后覆盖新文本
    async fn replace_selection_text(&mut self, text: &str) -> DriverResult<()>;

    /// 在光标处粘贴传输缓冲区内容
    async fn paste(&mut self) -> DriverResult<()>;

    /// 选区中的第一个内嵌图片
    async fn inline_image_in_selection(&mut self) -> DriverResult<Option<ImageRef>>;

    /// 选区所在范围中的第一个内嵌图片（表格单元格内插入的情况）
    async fn inline_image_in_selection_range(&mut self) -> DriverResult<Option<ImageRef>>;

    /// 向前扩展选区一个单位
    async fn extend_selection_back(&mut self) -> DriverResult<()>;

    async fn image_size(&mut self, image: ImageRef) -> DriverResult<ImageSize>;

    async fn set_image_size(&mut self, image: ImageRef, size: ImageSize) -> DriverResult<()>;

    async fn save(&mut self) -> DriverResult<()>;

    /// 关闭文档（不保存）
    async fn close_document(&mut self) -> DriverResult<()>;

    async fn quit(&mut self) -> DriverResult<()>;

    fn terminate(&mut self);
}

/// 已创建的应用程序句柄
pub enum EngineHandle {
    Spreadsheet(Box<dyn SpreadsheetEngine>),
    Document(Box<dyn DocumentEngine>),
}

impl EngineHandle {
    pub fn kind(&self) -> EngineKind {
        match self {
            EngineHandle::Spreadsheet(_) => EngineKind::Spreadsheet,
            EngineHandle::Document(_) => EngineKind::Document,
        }
    }

    pub async fn configure_non_interactive(&mut self) -> DriverResult<()> {
        match self {
            EngineHandle::Spreadsheet(engine) => engine.configure_non_interactive().await,
            EngineHandle::Document(engine) => engine.configure_non_interactive().await,
        }
    }

    pub fn terminate(&mut self) {
        match self {
            EngineHandle::Spreadsheet(engine) => engine.terminate(),
            EngineHandle::Document(engine) => engine.terminate(),
        }
    }

    pub fn into_spreadsheet(self) -> DriverResult<Box<dyn SpreadsheetEngine>> {
        match self {
            EngineHandle::Spreadsheet(engine) => Ok(engine),
            other => Err(DriverError::KindMismatch {
                expected: EngineKind::Spreadsheet,
                actual: other.kind(),
            }),
        }
    }

    pub fn into_document(self) -> DriverResult<Box<dyn DocumentEngine>> {
        match self {
            EngineHandle::Document(engine) => Ok(engine),
            other => Err(DriverError::KindMismatch {
                expected: EngineKind::Document,
                actual: other.kind(),
            }),
        }
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EngineHandle({:?})", self.kind())
    }
}

/// 自动化驱动：负责创建应用程序句柄以及进程级清理
#[async_trait]
pub trait AutomationDriver: Send + Sync {
    async fn launch(&self, kind: EngineKind, strategy: BindingStrategy) -> DriverResult<EngineHandle>;

    /// 释放部分完成的平台级初始化
    async fn release_platform(&self);

    /// 资源回收
    async fn sweep(&self);
}
