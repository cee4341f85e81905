//! 内存驱动
//!
//! 在内存中模拟表格引擎与文档引擎，供单元测试和集成测试使用：
//! - 工作簿按路径登记，只包含工作表名称及可见状态
//! - 文档从磁盘按纯文本读取，保存时图片写为 `[image 工作表!区域 宽x高pt]`
//! - 传输缓冲区为单槽，新写入覆盖旧内容
//! - 可注入故障：句柄创建失败、位置查询失败、粘贴为空、保存失败
//! - 可挂接粘贴回调，在第 N 次粘贴时触发外部动作

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use async_trait::async_trait;
use regex::Regex;

use crate::error::{DriverError, DriverResult};
use crate::infrastructure::driver::{
    AutomationDriver, BindingStrategy, DocumentEngine, EngineHandle, EngineKind, ImageRef,
    ImageSize, PageGeometry, SheetVisibility, SpreadsheetEngine,
};
use crate::infrastructure::transfer::{Snapshot, TransferBuffer};

/// 模拟单元格宽度（pt）
pub const CELL_WIDTH_PT: f64 = 48.0;
/// 模拟行高（pt），区域渲染和文档排版共用
pub const LINE_HEIGHT_PT: f64 = 15.0;

/// A4 纵向，上下边距 72pt
pub const DEFAULT_GEOMETRY: PageGeometry = PageGeometry {
    page_height: 841.89,
    top_margin: 72.0,
    bottom_margin: 72.0,
};

/// 模拟工作簿
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: BTreeMap<String, SheetVisibility>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet(self, name: &str) -> Self {
        self.with_sheet(name, SheetVisibility::Visible)
    }

    pub fn with_sheet(mut self, name: &str, visibility: SheetVisibility) -> Self {
        self.sheets.insert(name.to_string(), visibility);
        self
    }
}

/// 驱动调用统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverStats {
    pub launches: Vec<(EngineKind, BindingStrategy)>,
    pub platform_releases: usize,
    pub sweeps: usize,
    pub quits: usize,
    pub terminations: usize,
    pub captures: usize,
    pub pastes: usize,
    pub saves: usize,
}

#[derive(Debug, Default)]
struct Faults {
    launch_failures: HashMap<EngineKind, usize>,
    selection_offset: bool,
    range_offset: bool,
    empty_paste: bool,
    save: bool,
}

/// 粘贴回调，参数为累计粘贴次数
#[derive(Clone)]
struct PasteHook(Arc<dyn Fn(usize) + Send + Sync>);

impl std::fmt::Debug for PasteHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PasteHook")
    }
}

#[derive(Debug)]
struct World {
    workbooks: HashMap<PathBuf, Workbook>,
    geometry: PageGeometry,
    buffer: TransferBuffer,
    faults: Faults,
    stats: DriverStats,
    next_image: u64,
    paste_hook: Option<PasteHook>,
}

impl Default for World {
    fn default() -> Self {
        Self {
            workbooks: HashMap::new(),
            geometry: DEFAULT_GEOMETRY,
            buffer: TransferBuffer::new(),
            faults: Faults::default(),
            stats: DriverStats::default(),
            next_image: 1,
            paste_hook: None,
        }
    }
}

type SharedWorld = Arc<Mutex<World>>;

fn lock(world: &SharedWorld) -> MutexGuard<'_, World> {
    world.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 内存驱动，克隆后共享同一个模拟环境
#[derive(Debug, Clone, Default)]
pub struct MemoryDriver {
    world: SharedWorld,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个可以打开的工作簿
    pub fn add_workbook(&self, path: impl Into<PathBuf>, workbook: Workbook) {
        lock(&self.world).workbooks.insert(path.into(), workbook);
    }

    pub fn set_page_geometry(&self, geometry: PageGeometry) {
        lock(&self.world).geometry = geometry;
    }

    /// 接下来 `count` 次创建该类型句柄都失败
    pub fn fail_launches(&self, kind: EngineKind, count: usize) {
        lock(&self.world).faults.launch_failures.insert(kind, count);
    }

    pub fn fail_offset_queries(&self, selection: bool, range: bool) {
        let mut world = lock(&self.world);
        world.faults.selection_offset = selection;
        world.faults.range_offset = range;
    }

    /// 粘贴不产生任何内容
    pub fn fail_pastes(&self, enabled: bool) {
        lock(&self.world).faults.empty_paste = enabled;
    }

    pub fn fail_saves(&self, enabled: bool) {
        lock(&self.world).faults.save = enabled;
    }

    /// 每次粘贴后调用 `hook(累计粘贴次数)`
    pub fn on_paste(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        lock(&self.world).paste_hook = Some(PasteHook(Arc::new(hook)));
    }

    pub fn buffer(&self) -> TransferBuffer {
        lock(&self.world).buffer.clone()
    }

    pub fn stats(&self) -> DriverStats {
        lock(&self.world).stats.clone()
    }
}

#[async_trait]
impl AutomationDriver for MemoryDriver {
    async fn launch(&self, kind: EngineKind, strategy: BindingStrategy) -> DriverResult<EngineHandle> {
        {
            let mut world = lock(&self.world);
            world.stats.launches.push((kind, strategy));
            if let Some(remaining) = world.faults.launch_failures.get_mut(&kind) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(DriverError::call("launch", format!("{}应用程序启动失败", kind)));
                }
            }
        }

        let world = self.world.clone();
        Ok(match kind {
            EngineKind::Spreadsheet => EngineHandle::Spreadsheet(Box::new(MemorySpreadsheet {
                world,
                workbook: None,
            })),
            EngineKind::Document => EngineHandle::Document(Box::new(MemoryDocument {
                world,
                path: None,
                text: String::new(),
                images: BTreeMap::new(),
                selection: (0, 0),
            })),
        })
    }

    async fn release_platform(&self) {
        lock(&self.world).stats.platform_releases += 1;
    }

    async fn sweep(&self) {
        lock(&self.world).stats.sweeps += 1;
    }
}

struct MemorySpreadsheet {
    world: SharedWorld,
    workbook: Option<Workbook>,
}

impl MemorySpreadsheet {
    fn workbook(&self, operation: &str) -> DriverResult<&Workbook> {
        self.workbook
            .as_ref()
            .ok_or_else(|| DriverError::call(operation, "没有打开的工作簿"))
    }
}

#[async_trait]
impl SpreadsheetEngine for MemorySpreadsheet {
    async fn configure_non_interactive(&mut self) -> DriverResult<()> {
        Ok(())
    }

    async fn open_workbook(&mut self, path: &Path) -> DriverResult<()> {
        let workbook = lock(&self.world)
            .workbooks
            .get(path)
            .cloned()
            .ok_or_else(|| {
                DriverError::call("open_workbook", format!("无法打开 {}", path.display()))
            })?;
        self.workbook = Some(workbook);
        Ok(())
    }

    async fn sheet_visibility(&mut self, sheet: &str) -> DriverResult<Option<SheetVisibility>> {
        Ok(self.workbook("sheet_visibility")?.sheets.get(sheet).copied())
    }

    async fn copy_range_as_picture(&mut self, sheet: &str, range: &str) -> DriverResult<()> {
        if !self.workbook("copy_range_as_picture")?.sheets.contains_key(sheet) {
            return Err(DriverError::call("copy_range_as_picture", format!("工作表 {} 不存在", sheet)));
        }
        let size = range_size(range)
            .ok_or_else(|| DriverError::call("copy_range_as_picture", format!("无效的区域: {}", range)))?;

        let mut world = lock(&self.world);
        world.stats.captures += 1;
        world.buffer.put(Snapshot {
            source: format!("{}!{}", sheet, range),
            size,
        });
        Ok(())
    }

    async fn close_workbook(&mut self) -> DriverResult<()> {
        self.workbook = None;
        Ok(())
    }

    async fn quit(&mut self) -> DriverResult<()> {
        lock(&self.world).stats.quits += 1;
        Ok(())
    }

    fn terminate(&mut self) {
        lock(&self.world).stats.terminations += 1;
    }
}

/// 按单元格数量估算区域图片尺寸，例如 `B1:C2` → 96x30pt
fn range_size(range: &str) -> Option<ImageSize> {
    static RANGE_RE: OnceLock<Regex> = OnceLock::new();
    let re = RANGE_RE.get_or_init(|| {
        Regex::new(r"^\$?([A-Za-z]+)\$?(\d+)(?::\$?([A-Za-z]+)\$?(\d+))?$")
            .expect("区域正则表达式无效")
    });

    let caps = re.captures(range.trim())?;
    let start_col = column_index(caps.get(1)?.as_str());
    let start_row: u64 = caps.get(2)?.as_str().parse().ok()?;
    let (end_col, end_row) = match (caps.get(3), caps.get(4)) {
        (Some(col), Some(row)) => (column_index(col.as_str()), row.as_str().parse().ok()?),
        _ => (start_col, start_row),
    };

    let cols = start_col.abs_diff(end_col) + 1;
    let rows = start_row.abs_diff(end_row) + 1;
    Some(ImageSize::new(
        cols as f64 * CELL_WIDTH_PT,
        rows as f64 * LINE_HEIGHT_PT,
    ))
}

fn column_index(letters: &str) -> u64 {
    letters
        .chars()
        .fold(0, |acc, c| acc * 26 + (c.to_ascii_uppercase() as u64 - 'A' as u64 + 1))
}

#[derive(Debug, Clone)]
struct PlacedImage {
    source: String,
    size: ImageSize,
}

struct MemoryDocument {
    world: SharedWorld,
    path: Option<PathBuf>,
    text: String,
    images: BTreeMap<u64, PlacedImage>,
    /// 选区（字节偏移，左闭右开）
    selection: (usize, usize),
}

impl MemoryDocument {
    fn token(id: u64) -> String {
        format!("[[image:{}]]", id)
    }

    fn first_image_in(&self, start: usize, end: usize) -> Option<ImageRef> {
        static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
        let re = TOKEN_RE.get_or_init(|| {
            Regex::new(r"\[\[image:(\d+)\]\]").expect("图片标记正则表达式无效")
        });
        re.captures(&self.text[start..end])
            .and_then(|caps| caps[1].parse().ok())
            .map(ImageRef)
    }

    /// 选区所在行的范围
    fn line_bounds(&self, at: usize) -> (usize, usize) {
        let start = self.text[..at].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let end = self.text[at..]
            .find('\n')
            .map(|i| at + i)
            .unwrap_or(self.text.len());
        (start, end)
    }

    fn vertical_offset(&self) -> f64 {
        let geometry = lock(&self.world).geometry;
        let line = self.text[..self.selection.0].matches('\n').count();
        let body = (geometry.content_end() - geometry.top_margin).max(LINE_HEIGHT_PT);
        let lines_per_page = ((body / LINE_HEIGHT_PT).floor() as usize).max(1);
        geometry.top_margin + (line % lines_per_page) as f64 * LINE_HEIGHT_PT
    }

    fn image(&self, operation: &str, image: ImageRef) -> DriverResult<&PlacedImage> {
        self.images
            .get(&image.0)
            .ok_or_else(|| DriverError::call(operation, format!("图片 {} 不存在", image.0)))
    }

    fn rendered(&self) -> String {
        let mut out = self.text.clone();
        for (id, image) in &self.images {
            out = out.replace(
                &Self::token(*id),
                &format!(
                    "[image {} {:.1}x{:.1}pt]",
                    image.source, image.size.width, image.size.height
                ),
            );
        }
        out
    }
}

#[async_trait]
impl DocumentEngine for MemoryDocument {
    async fn configure_non_interactive(&mut self) -> DriverResult<()> {
        Ok(())
    }

    async fn open_document(&mut self, path: &Path) -> DriverResult<()> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DriverError::call("open_document", format!("{}: {}", path.display(), e)))?;
        self.text = text;
        self.path = Some(path.to_path_buf());
        self.images.clear();
        self.selection = (0, 0);
        Ok(())
    }

    async fn reset_cursor(&mut self) -> DriverResult<()> {
        self.selection = (0, 0);
        Ok(())
    }

    async fn find_next(&mut self, text: &str) -> DriverResult<bool> {
        if text.is_empty() {
            return Ok(false);
        }
        let from = self.selection.1;
        let found = self.text[from..]
            .find(text)
            .map(|i| from + i)
            .or_else(|| self.text.find(text));

        Ok(match found {
            Some(start) => {
                self.selection = (start, start + text.len());
                true
            }
            None => false,
        })
    }

    async fn page_geometry(&mut self) -> DriverResult<PageGeometry> {
        Ok(lock(&self.world).geometry)
    }

    async fn selection_vertical_offset(&mut self) -> DriverResult<f64> {
        if lock(&self.world).faults.selection_offset {
            return Err(DriverError::call("selection_vertical_offset", "位置信息不可用"));
        }
        Ok(self.vertical_offset())
    }

    async fn range_vertical_offset(&mut self) -> DriverResult<f64> {
        if lock(&self.world).faults.range_offset {
            return Err(DriverError::call("range_vertical_offset", "位置信息不可用"));
        }
        Ok(self.vertical_offset())
    }

    async fn replace_selection_text(&mut self, text: &str) -> DriverResult<()> {
        let (start, end) = self.selection;
        self.text.replace_range(start..end, text);
        self.selection = (start, start + text.len());
        Ok(())
    }

    async fn paste(&mut self) -> DriverResult<()> {
        let (pasted, hook, count) = {
            let mut world = lock(&self.world);
            world.stats.pastes += 1;
            let pasted = match world.buffer.peek() {
                Some(snapshot) if !world.faults.empty_paste => {
                    let id = world.next_image;
                    world.next_image += 1;
                    Some((snapshot, id))
                }
                _ => None,
            };
            (pasted, world.paste_hook.clone(), world.stats.pastes)
        };
        // 回调可能再访问驱动，锁释放后调用
        if let Some(PasteHook(hook)) = hook {
            hook(count);
        }
        let Some((snapshot, id)) = pasted else {
            return Ok(());
        };

        let token = Self::token(id);
        let (start, end) = self.selection;
        self.text.replace_range(start..end, &token);
        let cursor = start + token.len();
        self.selection = (cursor, cursor);
        self.images.insert(
            id,
            PlacedImage {
                source: snapshot.source,
                size: snapshot.size,
            },
        );
        Ok(())
    }

    async fn inline_image_in_selection(&mut self) -> DriverResult<Option<ImageRef>> {
        let (start, end) = self.selection;
        Ok(self.first_image_in(start, end))
    }

    /// 表格行（以 `|` 开头）中，选区范围扩展到整个单元格所在行
    async fn inline_image_in_selection_range(&mut self) -> DriverResult<Option<ImageRef>> {
        let (line_start, line_end) = self.line_bounds(self.selection.0);
        if self.text[line_start..line_end].starts_with('|') {
            Ok(self.first_image_in(line_start, line_end))
        } else {
            Ok(None)
        }
    }

    /// 向前扩展一个单位：图片算一个单位
    async fn extend_selection_back(&mut self) -> DriverResult<()> {
        let (start, end) = self.selection;
        let before = &self.text[..start];
        let new_start = if before.ends_with("]]") {
            before.rfind("[[image:").unwrap_or(start)
        } else {
            before
                .char_indices()
                .next_back()
                .map(|(i, _)| i)
                .unwrap_or(start)
        };
        self.selection = (new_start, end);
        Ok(())
    }

    async fn image_size(&mut self, image: ImageRef) -> DriverResult<ImageSize> {
        Ok(self.image("image_size", image)?.size)
    }

    async fn set_image_size(&mut self, image: ImageRef, size: ImageSize) -> DriverResult<()> {
        self.image("set_image_size", image)?;
        if let Some(placed) = self.images.get_mut(&image.0) {
            placed.size = size;
        }
        Ok(())
    }

    async fn save(&mut self) -> DriverResult<()> {
        {
            let mut world = lock(&self.world);
            if world.faults.save {
                return Err(DriverError::call("save", "文档被占用，无法保存"));
            }
            world.stats.saves += 1;
        }
        let path = self
            .path
            .clone()
            .ok_or_else(|| DriverError::call("save", "没有打开的文档"))?;
        tokio::fs::write(&path, self.rendered())
            .await
            .map_err(|e| DriverError::call("save", format!("{}: {}", path.display(), e)))
    }

    async fn close_document(&mut self) -> DriverResult<()> {
        self.path = None;
        self.text.clear();
        self.images.clear();
        self.selection = (0, 0);
        Ok(())
    }

    async fn quit(&mut self) -> DriverResult<()> {
        lock(&self.world).stats.quits += 1;
        Ok(())
    }

    fn terminate(&mut self) {
        lock(&self.world).stats.terminations += 1;
    }
}
